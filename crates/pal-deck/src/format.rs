//! Number formatting for generated decks.

/// Significant digits used per section.
pub const GRID_DIGITS: usize = 8;
pub const EDIT_DIGITS: usize = 6;
pub const PROPS_DIGITS: usize = 7;
pub const SOLUTION_DIGITS: usize = 8;
pub const SCHEDULE_DIGITS: usize = 7;

/// Values per line when writing long arrays.
const PER_LINE: usize = 8;

/// Format `value` rounded to `digits` significant digits, in the shortest
/// form that reads back to the rounded value.
pub fn format_sig(value: f64, digits: usize) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    let digits = digits.max(1);
    let rounded: f64 = format!("{:.*e}", digits - 1, value)
        .parse()
        .unwrap_or(value);
    let magnitude = rounded.abs();
    if (1e-4..1e9).contains(&magnitude) {
        format!("{rounded}")
    } else {
        format!("{rounded:e}")
    }
}

/// Collapse runs of identical tokens into `N*token`; runs of `1*` become `N*`.
pub fn compress(tokens: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut idx = 0;
    while idx < tokens.len() {
        let run = tokens[idx..]
            .iter()
            .take_while(|t| **t == tokens[idx])
            .count();
        if run > 1 && tokens[idx] == "1*" {
            out.push(format!("{run}*"));
        } else if run > 1 {
            out.push(format!("{run}*{}", tokens[idx]));
        } else {
            out.push(tokens[idx].clone());
        }
        idx += run;
    }
    out
}

/// Format, compress and wrap an array as the data record of a keyword.
pub fn array_record(values: &[f64], digits: usize) -> String {
    let tokens: Vec<String> = values.iter().map(|v| format_sig(*v, digits)).collect();
    let tokens = compress(&tokens);
    let mut out = String::new();
    for chunk in tokens.chunks(PER_LINE) {
        out.push(' ');
        out.push_str(&chunk.join(" "));
        out.push('\n');
    }
    out.push_str(" /\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_significant_digits() {
        assert_eq!(format_sig(1234.5678, 6), "1234.57");
        assert_eq!(format_sig(0.2, 8), "0.2");
        assert_eq!(format_sig(30.0, 7), "30");
        assert_eq!(format_sig(-0.0, 7), "0");
        assert_eq!(format_sig(4.5e-5, 7), "4.5e-5");
    }

    #[test]
    fn formatted_values_read_back() {
        for v in [3.280_839_895, 14.503_773_77, 1e12, 6.289_810_77e-6] {
            let text = format_sig(v, 8);
            let back: f64 = text.parse().unwrap();
            assert!(((back - v) / v).abs() < 1e-7, "{v} -> {text}");
        }
    }

    #[test]
    fn runs_are_compressed() {
        let tokens: Vec<String> = ["1", "1", "1", "2", "3", "3"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(compress(&tokens), vec!["3*1", "2", "2*3"]);
    }

    #[test]
    fn default_runs_stay_defaults() {
        let tokens: Vec<String> = ["'P1'", "1*", "1*", "1*", "7"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(compress(&tokens), vec!["'P1'", "3*", "7"]);
    }

    #[test]
    fn array_record_wraps_and_terminates() {
        let values: Vec<f64> = (0..10).map(f64::from).collect();
        let text = array_record(&values, 6);
        assert_eq!(text.lines().count(), 3);
        assert!(text.ends_with(" /\n"));
    }
}
