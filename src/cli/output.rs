//! CLI Output Formatting.
//!
//! Handles output formatting for the simulator (text table or JSON).

use console::style;
use serde::Serialize;

use crate::cli::simulation::DayReport;
use crate::utils::constants::STABLE_DECIMALS;

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT FORMAT
// ═══════════════════════════════════════════════════════════════════════════════

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON format
    Json,
    /// Pretty JSON format
    JsonPretty,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" | "table" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Ok(OutputFormat::JsonPretty),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// AMOUNTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Render base units as a whole-token amount with `precision` fractional digits
pub fn format_amount(raw: u128, decimals: u8, precision: usize) -> String {
    let unit = 10u128.pow(decimals as u32);
    let whole = raw / unit;
    if precision == 0 || decimals == 0 {
        return whole.to_string();
    }
    let fraction = format!("{:0width$}", raw % unit, width = decimals as usize);
    let shown = precision.min(decimals as usize);
    format!("{}.{}", whole, &fraction[..shown])
}

/// Table rows for a simulation run
pub fn report_rows(reports: &[DayReport]) -> Vec<Vec<String>> {
    reports
        .iter()
        .map(|r| {
            vec![
                r.day.to_string(),
                r.pool_price.to_string(),
                r.ema.to_string(),
                format_amount(r.borrowed, STABLE_DECIMALS, 4),
                format_amount(r.pool_underlying, STABLE_DECIMALS, 2),
                format_amount(r.total_debt, STABLE_DECIMALS, 4),
                r.reserve_ratio.to_string(),
                r.redeem_price.to_string(),
            ]
        })
        .collect()
}

/// Column headers matching [`report_rows`]
pub const REPORT_HEADERS: [&str; 8] = [
    "day",
    "pool price",
    "ema",
    "borrowed",
    "pool underlying",
    "debt",
    "reserve ratio",
    "redeem price",
];

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT FORMATTER
// ═══════════════════════════════════════════════════════════════════════════════

/// Output formatter for CLI
#[derive(Debug, Clone, Default)]
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    /// Create new formatter
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Get format
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Print success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Text => println!("{} {}", style("✓").green(), message),
            _ => self.print_json(&serde_json::json!({ "status": "success", "message": message })),
        }
    }

    /// Print info message
    pub fn info(&self, message: &str) {
        match self.format {
            OutputFormat::Text => println!("{} {}", style("→").cyan(), message),
            _ => self.print_json(&serde_json::json!({ "status": "info", "message": message })),
        }
    }

    /// Print error message
    pub fn error(&self, message: &str) {
        match self.format {
            OutputFormat::Text => eprintln!("{} {}", style("Error:").red().bold(), message),
            _ => self.print_json(&serde_json::json!({ "status": "error", "message": message })),
        }
    }

    /// Print serializable data
    pub fn data<T: Serialize>(&self, data: &T) {
        match self.format {
            OutputFormat::Text | OutputFormat::JsonPretty => {
                if let Ok(json) = serde_json::to_string_pretty(data) {
                    println!("{}", json);
                }
            }
            OutputFormat::Json => self.print_json(data),
        }
    }

    /// Print section header
    pub fn section(&self, title: &str) {
        if self.format == OutputFormat::Text {
            println!();
            println!("{}", style(format!("=== {} ===", title)).cyan().bold());
            println!();
        }
    }

    /// Print a simulation run
    pub fn reports(&self, reports: &[DayReport]) {
        match self.format {
            OutputFormat::Text => self.table(&REPORT_HEADERS, &report_rows(reports)),
            _ => self.data(&reports),
        }
    }

    /// Print a text table
    pub fn table(&self, headers: &[&str], rows: &[Vec<String>]) {
        let widths = column_widths(headers, rows);
        let header = headers
            .iter()
            .zip(&widths)
            .map(|(h, w)| format!("{:>w$}", h, w = *w))
            .collect::<Vec<_>>()
            .join("  ");
        println!("{}", style(header).bold());
        for row in rows {
            let line = row
                .iter()
                .zip(&widths)
                .map(|(v, w)| format!("{:>w$}", v, w = *w))
                .collect::<Vec<_>>()
                .join("  ");
            println!("{}", line);
        }
    }

    fn print_json<T: Serialize + ?Sized>(&self, data: &T) {
        let output = if self.format == OutputFormat::JsonPretty {
            serde_json::to_string_pretty(data)
        } else {
            serde_json::to_string(data)
        };
        if let Ok(json) = output {
            println!("{}", json);
        }
    }
}

fn column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            rows.iter()
                .filter_map(|row| row.get(i))
                .map(|v| v.len())
                .chain(std::iter::once(h.len()))
                .max()
                .unwrap_or(0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::math::Decimal;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(1_500_000, 6, 2), "1.50");
        assert_eq!(format_amount(1_500_000, 6, 0), "1");
        assert_eq!(format_amount(42, 6, 6), "0.000042");
        assert_eq!(format_amount(42, 6, 9), "0.000042");
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("TABLE".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_report_rows_align_with_headers() {
        let report = DayReport {
            day: 1,
            pool_price: Decimal::from_bps(9_700),
            ema: Decimal::ONE,
            borrowed: 0,
            pool_underlying: 10u128.pow(18),
            total_debt: 0,
            reserve_ratio: Decimal::ONE,
            redeem_price: Decimal::from_bps(9_500),
        };
        let rows = report_rows(&[report]);
        assert_eq!(rows[0].len(), REPORT_HEADERS.len());
        assert_eq!(rows[0][4], "1.00");

        let widths = column_widths(&REPORT_HEADERS, &rows);
        assert_eq!(widths[0], 3);
    }
}
