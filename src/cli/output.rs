//! CLI output formatting
//!
//! Text for humans, one JSON object per line for scripts.

use crate::core::output::OutputEntry;
use crate::core::transport::PortDescriptor;
use clap::ValueEnum;

/// CLI output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON lines for scripting
    Json,
}

/// Render one output log entry
pub fn format_entry(entry: &OutputEntry, format: OutputFormat, timestamps: bool) -> String {
    match format {
        OutputFormat::Text => entry.to_text(timestamps),
        OutputFormat::Json => serde_json::json!({
            "timestamp": entry.timestamp.to_rfc3339(),
            "tag": entry.tag.prefix(),
            "text": entry.text,
        })
        .to_string(),
    }
}

/// Render a port list
pub fn format_ports(ports: &[PortDescriptor], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            if ports.is_empty() {
                return "No serial ports found.".to_string();
            }
            ports
                .iter()
                .map(|p| match &p.serial_number {
                    Some(sn) => format!("{:<24} {}", p.name, sn),
                    None => p.name.clone(),
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
        OutputFormat::Json => serde_json::to_string(ports).unwrap_or_else(|_| "[]".to_string()),
    }
}

/// Render the offered baud rates, marking the default
pub fn format_baud_rates(rates: &[u32], default: u32, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => rates
            .iter()
            .map(|r| {
                if *r == default {
                    format!("{} (default)", r)
                } else {
                    r.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n"),
        OutputFormat::Json => serde_json::json!({ "rates": rates, "default": default }).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::output::MessageTag;

    #[test]
    fn test_text_entry() {
        let entry = OutputEntry::new(MessageTag::Sent, "PING");
        assert_eq!(format_entry(&entry, OutputFormat::Text, false), "TX PING");
    }

    #[test]
    fn test_json_entry() {
        let entry = OutputEntry::new(MessageTag::Received, "PONG");
        let line = format_entry(&entry, OutputFormat::Json, false);
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["tag"], "RX");
        assert_eq!(value["text"], "PONG");
    }

    #[test]
    fn test_port_list() {
        let ports = vec![
            PortDescriptor::new("ttyUSB0").with_serial_number("A1"),
            PortDescriptor::new("ttyS0"),
        ];
        let text = format_ports(&ports, OutputFormat::Text);
        assert!(text.starts_with("ttyUSB0"));
        assert!(text.contains("A1"));
        assert!(text.ends_with("ttyS0"));

        assert_eq!(format_ports(&[], OutputFormat::Text), "No serial ports found.");

        let json: Vec<PortDescriptor> =
            serde_json::from_str(&format_ports(&ports, OutputFormat::Json)).unwrap();
        assert_eq!(json, ports);
    }

    #[test]
    fn test_baud_rates_mark_default() {
        let text = format_baud_rates(&[4800, 9600], 9600, OutputFormat::Text);
        assert_eq!(text, "4800\n9600 (default)");
    }
}
