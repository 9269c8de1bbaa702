//! Label to payload rendering

use robolink_core::{GateConfig, Label, PayloadFormat};

/// Renders a label into the text handed to the transport.
#[derive(Debug, Clone)]
pub struct PayloadRenderer {
    format: PayloadFormat,
    /// (lowercased pattern, command), first match wins
    rules: Vec<(String, String)>,
}

impl PayloadRenderer {
    pub fn new(format: PayloadFormat, rules: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            format,
            rules: rules
                .into_iter()
                .map(|(pattern, command)| (pattern.trim().to_lowercase(), command.trim().to_string()))
                .collect(),
        }
    }

    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(
            config.payload_format,
            config
                .commands
                .iter()
                .map(|rule| (rule.pattern.clone(), rule.command.clone())),
        )
    }

    pub fn format(&self) -> PayloadFormat {
        self.format
    }

    /// Command for a label: the first rule whose pattern the label contains.
    pub fn command_for(&self, label: &Label) -> Option<&str> {
        let lowered = label.as_str().to_lowercase();
        self.rules
            .iter()
            .find(|(pattern, _)| lowered.contains(pattern.as_str()))
            .map(|(_, command)| command.as_str())
    }

    /// `None` when the label has no command under the `command` format.
    pub fn render(&self, label: &Label, confidence: f32) -> Option<String> {
        match self.format {
            PayloadFormat::Command => self.command_for(label).map(str::to_string),
            PayloadFormat::RawLabel => Some(label.to_string()),
            PayloadFormat::LabelWithConfidence => Some(format!("{} ({:.3})", label, confidence)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_renderer(format: PayloadFormat) -> PayloadRenderer {
        let config = GateConfig {
            payload_format: format,
            ..GateConfig::default()
        };
        PayloadRenderer::from_config(&config)
    }

    #[test]
    fn test_default_commands() {
        let renderer = default_renderer(PayloadFormat::Command);
        let cases = [
            ("FORWARD", Some("F")),
            ("GO BACKWARD", Some("B")),
            ("FORWARD LEFT", Some("F")),
            ("BACK", Some("B")),
            ("TURN LEFT", Some("L")),
            ("RIGHT", Some("R")),
            ("STOP", Some("S")),
            ("IDLE", None),
        ];
        for (label, expected) in cases {
            assert_eq!(
                renderer.render(&Label::normalize(label), 0.9).as_deref(),
                expected,
                "label {}",
                label
            );
        }
    }

    #[test]
    fn test_raw_and_verbose_formats() {
        let label = Label::normalize(" forward ");
        assert_eq!(
            default_renderer(PayloadFormat::RawLabel).render(&label, 0.5).as_deref(),
            Some("FORWARD")
        );
        assert_eq!(
            default_renderer(PayloadFormat::LabelWithConfidence)
                .render(&label, 0.98712)
                .as_deref(),
            Some("FORWARD (0.987)")
        );
    }

    #[test]
    fn test_rule_order_and_case() {
        let renderer = PayloadRenderer::new(
            PayloadFormat::Command,
            vec![
                ("Left".to_string(), "L".to_string()),
                ("left turn".to_string(), "X".to_string()),
            ],
        );
        assert_eq!(renderer.command_for(&Label::normalize("LEFT TURN")), Some("L"));
    }
}
