use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use std::fmt;

/// Emotion label to confidence mapping, kept in the order the service sent it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmotionScores(Vec<(String, f32)>);

impl EmotionScores {
    pub fn new(scores: Vec<(String, f32)>) -> Self {
        Self(scores)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.0.iter().map(|(name, score)| (name.as_str(), *score))
    }

    /// Scores from highest to lowest confidence.
    ///
    /// The sort is stable: equal scores keep the order the service returned
    /// them in. There is no other tie-break.
    pub fn ranked(&self) -> Vec<(&str, f32)> {
        let mut ranked: Vec<_> = self.iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    pub fn top(&self) -> Option<(&str, f32)> {
        self.ranked().into_iter().next()
    }

    /// Text shown under a face, e.g. `happiness (87%)`.
    pub fn label(&self) -> String {
        match self.top() {
            Some((name, score)) => format_label(name, score),
            None => String::from("unknown"),
        }
    }
}

pub fn format_label(name: &str, score: f32) -> String {
    format!("{} ({}%)", name, format_percent(score))
}

// at most two decimals, trailing zeros dropped
fn format_percent(score: f32) -> String {
    let percent = (score as f64 * 100.0 * 100.0).round() / 100.0;
    format!("{}", percent)
}

impl<'de> Deserialize<'de> for EmotionScores {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ScoresVisitor;

        impl<'de> Visitor<'de> for ScoresVisitor {
            type Value = EmotionScores;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of emotion names to scores")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut scores = Vec::with_capacity(map.size_hint().unwrap_or(8));
                while let Some((name, score)) = map.next_entry::<String, f32>()? {
                    scores.push((name, score));
                }
                Ok(EmotionScores(scores))
            }
        }

        deserializer.deserialize_map(ScoresVisitor)
    }
}
