use std::future::Future;

use anyhow::Result;
use thiserror::Error;
use tracing::error;

/// Outcome of the wallet debit step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Debit {
    Applied,
    Insufficient { shortfall: i64 },
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("insufficient balance, {shortfall} Rials short")]
    InsufficientBalance { shortfall: i64 },
    #[error("remote panel call failed")]
    Remote(#[source] anyhow::Error),
    #[error("local commit failed after the remote call succeeded")]
    Commit(#[source] anyhow::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Runs a paid provisioning flow with compensation.
///
/// Steps run as debit, remote mutation, local commit. If the remote call
/// fails the debit is refunded; if the commit fails the remote mutation is
/// undone first and the debit refunded after, so the system unwinds in
/// reverse order. Compensation failures are logged and swallowed: the
/// caller still sees the original error.
pub async fn run<R, C, Db, DbFut, Rm, RmFut, Cm, CmFut, Un, UnFut, Rf, RfFut>(
    debit: Db,
    remote: Rm,
    commit: Cm,
    undo_remote: Un,
    refund: Rf,
) -> Result<(R, C), ProvisionError>
where
    R: Clone,
    Db: FnOnce() -> DbFut,
    DbFut: Future<Output = Result<Debit>>,
    Rm: FnOnce() -> RmFut,
    RmFut: Future<Output = Result<R>>,
    Cm: FnOnce(R) -> CmFut,
    CmFut: Future<Output = Result<C>>,
    Un: FnOnce(R) -> UnFut,
    UnFut: Future<Output = Result<()>>,
    Rf: FnOnce() -> RfFut,
    RfFut: Future<Output = Result<()>>,
{
    match debit().await? {
        Debit::Applied => {}
        Debit::Insufficient { shortfall } => {
            return Err(ProvisionError::InsufficientBalance { shortfall });
        }
    }

    let remote_out = match remote().await {
        Ok(out) => out,
        Err(remote_err) => {
            if let Err(refund_err) = refund().await {
                error!("Refund after a failed remote call also failed: {refund_err:#}");
            }
            return Err(ProvisionError::Remote(remote_err));
        }
    };

    match commit(remote_out.clone()).await {
        Ok(committed) => Ok((remote_out, committed)),
        Err(commit_err) => {
            if let Err(undo_err) = undo_remote(remote_out).await {
                error!("Remote undo after a failed commit also failed: {undo_err:#}");
            }
            if let Err(refund_err) = refund().await {
                error!("Refund after a failed commit also failed: {refund_err:#}");
            }
            Err(ProvisionError::Commit(commit_err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn success_runs_debit_remote_commit_in_order() {
        let trace: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let (t1, t2, t3) = (trace.clone(), trace.clone(), trace.clone());

        let (remote_out, committed) = run(
            move || async move {
                t1.lock().unwrap().push("debit");
                anyhow::Ok(Debit::Applied)
            },
            move || async move {
                t2.lock().unwrap().push("remote");
                anyhow::Ok(7u32)
            },
            move |out: u32| async move {
                t3.lock().unwrap().push("commit");
                anyhow::Ok(out + 1)
            },
            |_: u32| async { anyhow::Ok(()) },
            || async { anyhow::Ok(()) },
        )
        .await
        .unwrap();

        assert_eq!(remote_out, 7);
        assert_eq!(committed, 8);
        assert_eq!(*trace.lock().unwrap(), vec!["debit", "remote", "commit"]);
    }

    #[tokio::test]
    async fn insufficient_balance_stops_before_the_remote_call() {
        let remote_called = Arc::new(Mutex::new(false));
        let flag = remote_called.clone();

        let result = run(
            || async { anyhow::Ok(Debit::Insufficient { shortfall: 5_000 }) },
            move || async move {
                *flag.lock().unwrap() = true;
                anyhow::Ok(0u8)
            },
            |_: u8| async { anyhow::Ok(()) },
            |_: u8| async { anyhow::Ok(()) },
            || async { anyhow::Ok(()) },
        )
        .await;

        assert!(matches!(
            result,
            Err(ProvisionError::InsufficientBalance { shortfall: 5_000 })
        ));
        assert!(!*remote_called.lock().unwrap());
    }

    #[tokio::test]
    async fn failed_remote_call_refunds_the_debit_and_commits_nothing() {
        let balance = Arc::new(Mutex::new(50_000i64));
        let committed = Arc::new(Mutex::new(false));
        let (debit_bal, refund_bal, commit_flag) =
            (balance.clone(), balance.clone(), committed.clone());

        let result = run(
            move || async move {
                *debit_bal.lock().unwrap() -= 30_000;
                anyhow::Ok(Debit::Applied)
            },
            || async { Err::<u8, _>(anyhow!("panel unreachable")) },
            move |_: u8| async move {
                *commit_flag.lock().unwrap() = true;
                anyhow::Ok(())
            },
            |_: u8| async { anyhow::Ok(()) },
            move || async move {
                *refund_bal.lock().unwrap() += 30_000;
                anyhow::Ok(())
            },
        )
        .await;

        assert!(matches!(result, Err(ProvisionError::Remote(_))));
        assert_eq!(*balance.lock().unwrap(), 50_000);
        assert!(!*committed.lock().unwrap());
    }

    #[tokio::test]
    async fn failed_commit_undoes_remote_before_refunding() {
        let trace: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let (undo_trace, refund_trace) = (trace.clone(), trace.clone());

        let result = run(
            || async { anyhow::Ok(Debit::Applied) },
            || async { anyhow::Ok(42u32) },
            |_: u32| async { Err::<(), _>(anyhow!("order insert failed")) },
            move |out: u32| async move {
                undo_trace.lock().unwrap().push(format!("undo {out}"));
                anyhow::Ok(())
            },
            move || async move {
                refund_trace.lock().unwrap().push("refund".to_string());
                anyhow::Ok(())
            },
        )
        .await;

        assert!(matches!(result, Err(ProvisionError::Commit(_))));
        // The remote side is unwound first and sees the remote output.
        assert_eq!(*trace.lock().unwrap(), vec!["undo 42", "refund"]);
    }

    #[tokio::test]
    async fn compensation_failure_keeps_the_original_error() {
        let result = run(
            || async { anyhow::Ok(Debit::Applied) },
            || async { Err::<u8, _>(anyhow!("panel unreachable")) },
            |_: u8| async { anyhow::Ok(()) },
            |_: u8| async { anyhow::Ok(()) },
            || async { Err(anyhow!("refund failed too")) },
        )
        .await;

        assert!(matches!(result, Err(ProvisionError::Remote(_))));
    }
}
