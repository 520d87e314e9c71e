use pasaj_db::models::{Server, ServerLoad};

/// Weight that nudges ties between equally-utilized servers toward the one
/// with fewer absolute subscribers.
const COUNT_BIAS: f64 = 0.01;

/// Picks the server new subscriptions should land on.
///
/// Servers without a positive ceiling are scored by raw subscriber count.
/// Servers with a ceiling are scored by utilization plus a small count
/// bias, and are skipped entirely once full. Lowest score wins; equal
/// scores keep the incoming (id) order, so the pick is deterministic.
pub fn select_best(servers: Vec<ServerLoad>) -> Option<Server> {
    let mut scored: Vec<(f64, ServerLoad)> = Vec::new();

    for server in servers {
        if !server.active {
            continue;
        }
        let count = server.subscribers as f64;
        let score = match server.user_limit {
            Some(limit) if limit > 0 => {
                if server.subscribers >= limit {
                    continue;
                }
                count / limit as f64 + count * COUNT_BIAS
            }
            _ => count,
        };
        scored.push((score, server));
    }

    scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().next().map(|(_, server)| server.into_server())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candidate(id: i64, user_limit: Option<i64>, subscribers: i64, active: bool) -> ServerLoad {
        ServerLoad {
            id,
            title: format!("srv-{id}"),
            panel_url: "https://panel.example.com/p".to_string(),
            api_key: "key".to_string(),
            client_url: None,
            user_limit,
            active,
            created_at: Utc::now(),
            subscribers,
        }
    }

    #[test]
    fn lower_utilization_wins_between_capped_servers() {
        let picked = select_best(vec![
            candidate(1, Some(100), 80, true),
            candidate(2, Some(100), 20, true),
        ])
        .unwrap();
        assert_eq!(picked.id, 2);
    }

    #[test]
    fn count_bias_breaks_utilization_ties() {
        // 30/100 and 60/200 utilize equally; the bias prefers fewer users.
        let picked = select_best(vec![
            candidate(1, Some(200), 60, true),
            candidate(2, Some(100), 30, true),
        ])
        .unwrap();
        assert_eq!(picked.id, 2);
    }

    #[test]
    fn uncapped_servers_score_by_raw_count() {
        let picked = select_best(vec![
            candidate(1, None, 5, true),
            candidate(2, Some(100), 50, true),
        ])
        .unwrap();
        // Utilization score 0.5 + 0.5 = 1.0 undercuts the raw count 5.
        assert_eq!(picked.id, 2);
    }

    #[test]
    fn zero_ceiling_counts_as_uncapped() {
        let picked = select_best(vec![
            candidate(1, Some(0), 3, true),
            candidate(2, Some(0), 1, true),
        ])
        .unwrap();
        assert_eq!(picked.id, 2);
    }

    #[test]
    fn full_servers_are_never_picked() {
        let picked = select_best(vec![
            candidate(1, Some(10), 10, true),
            candidate(2, Some(100), 99, true),
        ])
        .unwrap();
        assert_eq!(picked.id, 2);

        assert!(select_best(vec![candidate(1, Some(10), 10, true)]).is_none());
    }

    #[test]
    fn inactive_servers_are_skipped_and_empty_input_yields_none() {
        assert!(select_best(vec![]).is_none());
        assert!(select_best(vec![candidate(1, None, 0, false)]).is_none());

        let picked = select_best(vec![
            candidate(1, Some(10), 1, false),
            candidate(2, Some(10), 9, true),
        ])
        .unwrap();
        assert_eq!(picked.id, 2);
    }

    #[test]
    fn equal_scores_keep_the_first_candidate() {
        let picked = select_best(vec![
            candidate(1, Some(100), 40, true),
            candidate(2, Some(100), 40, true),
        ])
        .unwrap();
        assert_eq!(picked.id, 1);
    }
}
