use crate::error::Result;
use console::{style, Style};
use serde::Serialize;
use vitals_sampler::{
    AlertEvent, MetricsSnapshot, Publication, SamplerConfig, Severity, ThresholdConfig, ThresholdKey,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Yaml,
    Raw,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "table" => Ok(OutputFormat::Table),
            "csv" => Ok(OutputFormat::Csv),
            "yaml" => Ok(OutputFormat::Yaml),
            "raw" => Ok(OutputFormat::Raw),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

#[derive(Serialize)]
struct SnapshotReport<'a> {
    snapshot: &'a MetricsSnapshot,
    alerts: &'a [AlertEvent],
}

struct ThresholdRow {
    key: &'static str,
    value: f64,
    default: f64,
    min: f64,
    max: f64,
    unit: &'static str,
}

pub struct OutputManager {
    format: OutputFormat,
    colored: bool,
}

impl OutputManager {
    pub fn new(format: OutputFormat, colored: bool) -> Self {
        Self {
            format,
            colored,
        }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn print_snapshot(&self, snapshot: &MetricsSnapshot, alerts: &[AlertEvent]) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&SnapshotReport { snapshot, alerts })?);
            }
            OutputFormat::Yaml => {
                print!("{}", serde_yaml::to_string(&SnapshotReport { snapshot, alerts })?);
            }
            OutputFormat::Table => {
                self.print_snapshot_table(snapshot)?;
                if !alerts.is_empty() {
                    println!();
                    self.print_heading("Alerts");
                    for alert in alerts {
                        self.print_alert(alert)?;
                    }
                }
            }
            OutputFormat::Csv => {
                println!("metric,value");
                for (key, value) in snapshot.samples() {
                    println!("{},{:.2}", key, value);
                }
            }
            OutputFormat::Raw => {
                for (key, value) in snapshot.samples() {
                    println!("{}: {:.2}", key, value);
                }
                for alert in alerts {
                    println!("alert {} [{}]: {}", alert.key, alert.severity, alert.message);
                }
            }
        }
        Ok(())
    }

    /// One tick of `vitalsctl watch`; structured formats emit one record per tick
    pub fn print_tick(&self, publication: &Publication) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(publication)?);
            }
            OutputFormat::Yaml => {
                println!("---");
                print!("{}", serde_yaml::to_string(publication)?);
            }
            OutputFormat::Csv => {
                let snapshot = &publication.snapshot;
                println!(
                    "{},{:.1},{:.1},{:.1},{:.0},{:.0},{}",
                    snapshot.timestamp.to_rfc3339(),
                    snapshot.cpu_usage,
                    snapshot.memory_usage,
                    snapshot.swap_usage(),
                    snapshot.disk_io_bytes_per_sec(),
                    snapshot.network_io_bytes_per_sec(),
                    publication.active_alerts.join(";")
                );
            }
            OutputFormat::Table | OutputFormat::Raw => {
                let snapshot = &publication.snapshot;
                let mut line = format!(
                    "{}  cpu {:>5.1}%  mem {:>5.1}%  swap {:>5.1}%  disk {:>10}  net {:>10}",
                    snapshot.timestamp.format("%H:%M:%S"),
                    snapshot.cpu_usage,
                    snapshot.memory_usage,
                    snapshot.swap_usage(),
                    format_rate(snapshot.disk_io_bytes_per_sec()),
                    format_rate(snapshot.network_io_bytes_per_sec()),
                );
                for gpu in &snapshot.gpus {
                    if let Some(utilization) = gpu.utilization {
                        line.push_str(&format!("  gpu{} {:>5.1}%", gpu.id, utilization));
                    }
                }
                if !publication.active_alerts.is_empty() && self.format == OutputFormat::Table {
                    line.push_str(&format!("  [{}]", publication.active_alerts.join(", ")));
                }
                if self.colored && !publication.active_alerts.is_empty() {
                    println!("{}", style(line).yellow());
                } else {
                    println!("{}", line);
                }
                for alert in &publication.alerts {
                    self.print_alert(alert)?;
                }
            }
        }
        Ok(())
    }

    pub fn print_alert(&self, alert: &AlertEvent) -> Result<()> {
        match alert.severity {
            Severity::Warning => self.print_warning(&alert.message),
            Severity::Error => self.print_error(&alert.message),
        }
    }

    pub fn print_thresholds(&self, thresholds: &ThresholdConfig) -> Result<()> {
        let rows: Vec<ThresholdRow> = ThresholdKey::ALL
            .into_iter()
            .map(|key| {
                let (min, max) = key.range();
                ThresholdRow {
                    key: key.as_str(),
                    value: thresholds.get(key),
                    default: key.default_value(),
                    min,
                    max,
                    unit: key.unit(),
                }
            })
            .collect();

        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&thresholds.to_record())?);
            }
            OutputFormat::Yaml => {
                print!("{}", serde_yaml::to_string(&thresholds.to_record())?);
            }
            OutputFormat::Csv => {
                println!("key,value,default,min,max,unit");
                for row in &rows {
                    println!("{},{},{},{},{},{}", row.key, row.value, row.default, row.min, row.max, row.unit);
                }
            }
            OutputFormat::Raw => {
                for row in &rows {
                    println!("{}: {}", row.key, row.value);
                }
            }
            OutputFormat::Table => {
                self.print_heading("Alert Thresholds");
                println!("{:<14} {:>10} {:>10} {:>16}", "Key", "Value", "Default", "Range");
                println!("{:-<14} {:->10} {:->10} {:->16}", "", "", "", "");
                for row in &rows {
                    let value = format!("{}{}", row.value, row.unit);
                    let range = format!("{}..={}", row.min, row.max);
                    let value_style = if row.value == row.default {
                        Style::new()
                    } else {
                        Style::new().cyan()
                    };
                    if self.colored {
                        println!(
                            "{:<14} {:>10} {:>10} {:>16}",
                            style(row.key).bold().blue(),
                            value_style.apply_to(value),
                            format!("{}{}", row.default, row.unit),
                            style(range).dim()
                        );
                    } else {
                        println!(
                            "{:<14} {:>10} {:>10} {:>16}",
                            row.key,
                            value,
                            format!("{}{}", row.default, row.unit),
                            range
                        );
                    }
                }
            }
        }
        Ok(())
    }

    pub fn print_config(&self, config: &SamplerConfig) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(config)?);
            }
            OutputFormat::Yaml => {
                print!("{}", serde_yaml::to_string(config)?);
            }
            OutputFormat::Raw => {
                print!("{}", toml::to_string_pretty(config)?);
            }
            OutputFormat::Csv | OutputFormat::Table => {
                let thresholds_path = config
                    .thresholds_path()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "<in memory>".to_string());
                let entries = [
                    ("interval_ms", config.interval_ms.to_string()),
                    ("history_capacity", config.history_capacity.to_string()),
                    ("hysteresis_factor", config.hysteresis_factor.to_string()),
                    ("channel_capacity", config.channel_capacity.to_string()),
                    ("thresholds_path", thresholds_path),
                    ("gpu.enabled", config.gpu.enabled.to_string()),
                    ("gpu.command", config.gpu.command.clone()),
                ];

                if self.format == OutputFormat::Csv {
                    println!("key,value");
                    for (key, value) in &entries {
                        println!("{},\"{}\"", key, value.replace('"', "\"\""));
                    }
                } else {
                    self.print_heading("Configuration");
                    println!("{:<20} {}", "Key", "Value");
                    println!("{:-<20} {:-<40}", "", "");
                    for (key, value) in &entries {
                        if self.colored {
                            println!("{:<20} {}", style(key).bold().blue(), style(value).green());
                        } else {
                            println!("{:<20} {}", key, value);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub fn print_key_value(&self, key: &str, value: &str) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let entry = std::collections::BTreeMap::from([(key, value)]);
                println!("{}", serde_json::to_string_pretty(&entry)?);
            }
            OutputFormat::Table if self.colored => {
                println!("{}: {}", style(key).bold().blue(), style(value).green());
            }
            OutputFormat::Csv => {
                println!("{},{}", key, value);
            }
            _ => {
                println!("{}: {}", key, value);
            }
        }
        Ok(())
    }

    pub fn print_success(&self, message: &str) -> Result<()> {
        if self.colored {
            println!("{} {}", style("✓").green().bold(), message);
        } else {
            println!("✓ {}", message);
        }
        Ok(())
    }

    pub fn print_warning(&self, message: &str) -> Result<()> {
        if self.colored {
            println!("{} {}", style("⚠").yellow().bold(), message);
        } else {
            println!("⚠ {}", message);
        }
        Ok(())
    }

    pub fn print_error(&self, message: &str) -> Result<()> {
        if self.colored {
            eprintln!("{} {}", style("✗").red().bold(), message);
        } else {
            eprintln!("✗ {}", message);
        }
        Ok(())
    }

    fn print_heading(&self, title: &str) {
        if self.colored {
            println!("{}", style(title).bold().underlined());
        } else {
            println!("{}", title);
        }
    }

    fn print_snapshot_table(&self, snapshot: &MetricsSnapshot) -> Result<()> {
        let title = format!(
            "System Metrics ({})",
            snapshot.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        );
        self.print_heading(&title);

        let swap = if snapshot.swap_total == 0 {
            "not configured".to_string()
        } else {
            format!(
                "{} / {} ({:.1}%)",
                format_bytes(snapshot.swap_used),
                format_bytes(snapshot.swap_total),
                snapshot.swap_usage()
            )
        };

        let rows = [
            ("CPU", format!("{:.1}%", snapshot.cpu_usage)),
            ("Memory", format!("{:.1}%", snapshot.memory_usage)),
            ("Swap", swap),
            ("Disk read", format_rate(snapshot.disk_read_bytes_per_sec)),
            ("Disk write", format_rate(snapshot.disk_write_bytes_per_sec)),
            ("Network rx", format_rate(snapshot.network_rx_bytes_per_sec)),
            ("Network tx", format_rate(snapshot.network_tx_bytes_per_sec)),
        ];
        for (label, value) in &rows {
            self.print_row(label, value);
        }

        if snapshot.gpus.is_empty() {
            return Ok(());
        }

        println!();
        self.print_heading("GPUs");
        println!("{:<4} {:<28} {:>8} {:>8} {:>8}", "ID", "Name", "Util", "Memory", "Temp");
        println!("{:-<4} {:-<28} {:->8} {:->8} {:->8}", "", "", "", "", "");
        for gpu in &snapshot.gpus {
            println!(
                "{:<4} {:<28} {:>8} {:>8} {:>8}",
                gpu.id,
                truncate(&gpu.name, 28),
                format_optional(gpu.utilization, "%"),
                format_optional(gpu.memory_usage, "%"),
                format_optional(gpu.temperature, "°C"),
            );
        }
        Ok(())
    }

    fn print_row(&self, label: &str, value: &str) {
        if self.colored {
            println!("  {:<12} {}", style(label).bold(), value);
        } else {
            println!("  {:<12} {}", label, value);
        }
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

pub fn format_rate(bytes_per_sec: f64) -> String {
    format!("{}/s", format_bytes(bytes_per_sec.max(0.0).round() as u64))
}

fn format_optional(value: Option<f64>, unit: &str) -> String {
    value
        .map(|v| format!("{:.1}{}", v, unit))
        .unwrap_or_else(|| "n/a".to_string())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
