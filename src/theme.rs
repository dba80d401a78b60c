use crate::model::{LogicAssignment, NodeType};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static HEX_COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").unwrap());
static HSL_COLOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^hsl\(\s*(\d{1,3})\s*,\s*(\d{1,3})%\s*,\s*(\d{1,3})%\s*\)$").unwrap()
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub node_text_color: String,
    pub node_border_color: String,
    pub line_color: String,
    pub edge_label_background: String,
    pub cluster_background: String,
    pub cluster_border: String,
    pub cluster_text_color: String,
    pub background: String,
    pub evidence_color: String,
    pub secret_color: String,
    pub location_color: String,
    pub character_color: String,
}

impl Theme {
    pub fn classic() -> Self {
        Self {
            font_family: "\"trebuchet ms\", verdana, arial, sans-serif".to_string(),
            font_size: 14.0,
            node_text_color: "#FFFFFF".to_string(),
            node_border_color: "#FFFFFF".to_string(),
            line_color: "#888888".to_string(),
            edge_label_background: "#F4F4F4".to_string(),
            cluster_background: "#F6F8FA".to_string(),
            cluster_border: "#9AA4B2".to_string(),
            cluster_text_color: "#1C2430".to_string(),
            background: "#FFFFFF".to_string(),
            evidence_color: "#2563eb".to_string(),
            secret_color: "#dc2626".to_string(),
            location_color: "#ea580c".to_string(),
            character_color: "#7c3aed".to_string(),
        }
    }

    pub fn dark() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 13.0,
            node_text_color: "#FFFFFF".to_string(),
            node_border_color: "#E6EDF3".to_string(),
            line_color: "#8B949E".to_string(),
            edge_label_background: "#161B22".to_string(),
            cluster_background: "#161B22".to_string(),
            cluster_border: "#30363D".to_string(),
            cluster_text_color: "#E6EDF3".to_string(),
            background: "#0D1117".to_string(),
            ..Self::classic()
        }
    }

    pub fn node_fill(&self, node_type: NodeType) -> &str {
        match node_type {
            NodeType::Evidence => &self.evidence_color,
            NodeType::Secret => &self.secret_color,
            NodeType::Location => &self.location_color,
            NodeType::Character => &self.character_color,
        }
    }

    /// Colour of a logic chain: the logic's explicit colour, else its hash colour.
    pub fn logic_color(&self, logic_id: &str, assignment: &LogicAssignment) -> String {
        assignment
            .logic(logic_id)
            .and_then(|logic| logic.color.clone())
            .filter(|color| !color.trim().is_empty())
            .unwrap_or_else(|| hash_color(logic_id))
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::classic()
    }
}

/// Stable `hsl(h, 70%, 50%)` colour derived from a string.
///
/// Hashes UTF-16 code units with `h = c + ((h << 5) - h)` the way browser
/// clients evaluate it: only the shift truncates to 32 bits, the sum and
/// difference do not.
pub fn hash_color(value: &str) -> String {
    let mut hash: i64 = 0;
    for unit in value.encode_utf16() {
        let shifted = (hash as i32).wrapping_shl(5) as i64;
        hash = i64::from(unit) + (shifted - hash);
    }
    let hue = hash.unsigned_abs() % 360;
    format!("hsl({hue}, 70%, 50%)")
}

/// Accepts `#rgb`, `#rrggbb` and `hsl(h, s%, l%)`.
pub fn is_valid_color(value: &str) -> bool {
    let value = value.trim();
    if HEX_COLOR_RE.is_match(value) {
        return true;
    }
    let Some(caps) = HSL_COLOR_RE.captures(value) else {
        return false;
    };
    let part = |idx: usize| caps.get(idx).and_then(|m| m.as_str().parse::<u32>().ok());
    matches!(
        (part(1), part(2), part(3)),
        (Some(h), Some(s), Some(l)) if h < 360 && s <= 100 && l <= 100
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Logic;

    #[test]
    fn hash_color_is_stable_and_in_range() {
        let a = hash_color("logic_0");
        assert_eq!(a, hash_color("logic_0"));
        assert!(a.starts_with("hsl("));
        assert_eq!(hash_color(""), "hsl(0, 70%, 50%)");
        // "a" is 97 -> hue 97
        assert_eq!(hash_color("a"), "hsl(97, 70%, 50%)");
    }

    #[test]
    fn hash_color_only_truncates_the_shift() {
        assert_eq!(hash_color("logic_9"), "hsl(280, 70%, 50%)");
        assert_eq!(hash_color("logic_10"), "hsl(208, 70%, 50%)");
        assert_eq!(hash_color("logic_25"), "hsl(172, 70%, 50%)");
    }

    #[test]
    fn explicit_logic_color_wins_over_hash() {
        let theme = Theme::classic();
        let assignment = LogicAssignment {
            node_to_logic: Default::default(),
            logics: vec![Logic {
                logic_id: "logic_0".to_string(),
                name: "Motive".to_string(),
                color: Some("#123456".to_string()),
            }],
        };
        assert_eq!(theme.logic_color("logic_0", &assignment), "#123456");
        assert_eq!(theme.logic_color("logic_9", &assignment), hash_color("logic_9"));
    }

    #[test]
    fn color_validation() {
        assert!(is_valid_color("#abc"));
        assert!(is_valid_color("#A1B2C3"));
        assert!(is_valid_color("hsl(120, 70%, 50%)"));
        assert!(is_valid_color(&hash_color("logic_3")));
        assert!(!is_valid_color("hsl(400, 70%, 50%)"));
        assert!(!is_valid_color("red"));
        assert!(!is_valid_color("#abcd"));
    }

    #[test]
    fn every_node_type_has_a_fill() {
        let theme = Theme::dark();
        for node_type in NodeType::ALL {
            assert!(theme.node_fill(node_type).starts_with('#'));
        }
    }
}
