/// All arithmetic in the store happens in Rials; Tomans exist only in
/// rendered text. One Toman is ten Rials.
pub fn format_toman(rial: i64) -> String {
    let toman = rial / 10;
    format!("{} Toman", group_thousands(toman))
}

fn group_thousands(value: i64) -> String {
    let digits = value.abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if value < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rial_amounts_render_as_grouped_tomans() {
        assert_eq!(format_toman(100_000), "10,000 Toman");
        assert_eq!(format_toman(1_505_000), "150,500 Toman");
        assert_eq!(format_toman(90), "9 Toman");
        assert_eq!(format_toman(0), "0 Toman");
    }

    #[test]
    fn display_truncates_sub_toman_remainders() {
        assert_eq!(format_toman(15), "1 Toman");
        assert_eq!(format_toman(9), "0 Toman");
    }
}
