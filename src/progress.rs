//! Progress lines printed while a stage walks its leaves.

use chrono::Local;

/// `<local timestamp> <count>/<total> <percent>%`, percent to three significant digits.
pub fn progress_line(count: usize, total: usize) -> String {
    format!(
        "{} {}/{} {}%",
        Local::now().format("%Y-%m-%dT%H:%M:%S%.6f"),
        count,
        total,
        percent(count, total)
    )
}

fn percent(count: usize, total: usize) -> String {
    let pct = 100.0 * count as f64 / total.max(1) as f64;
    let decimals = if pct >= 100.0 {
        0
    } else if pct >= 10.0 {
        1
    } else if pct >= 1.0 {
        2
    } else {
        3
    };
    let text = format!("{:.*}", decimals, pct);
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_significant_digits() {
        assert_eq!(percent(1, 3), "33.3");
        assert_eq!(percent(1, 2), "50");
        assert_eq!(percent(3, 3), "100");
        assert_eq!(percent(1, 15), "6.67");
        assert_eq!(percent(1, 1000), "0.1");
        assert_eq!(percent(0, 0), "0");
    }

    #[test]
    fn test_progress_line_shape() {
        let line = progress_line(2, 4);
        assert!(line.ends_with(" 2/4 50%"), "{}", line);
        assert_eq!(line.split(' ').count(), 3);
    }
}
