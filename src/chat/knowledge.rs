//! Canned answers used when the remote assistant is unreachable

struct Topic {
    keywords: &'static [&'static str],
    answer: &'static str,
}

/// Keyword-matched farming answers
pub struct LocalKnowledgeBase {
    topics: Vec<Topic>,
    fallback: &'static str,
}

impl LocalKnowledgeBase {
    pub fn new() -> Self {
        Self {
            topics: vec![
                Topic {
                    keywords: &["manure", "compost", "vermicompost", "dung"],
                    answer: "Well-rotted farmyard manure or compost improves soil structure. Apply 5-10 tonnes per acre before sowing and mix it into the top soil. Never apply fresh manure directly to growing crops.",
                },
                Topic {
                    keywords: &["pest", "insect", "aphid", "worm", "bug"],
                    answer: "Inspect leaves (both sides) twice a week. Start with neem oil spray (5 ml per litre of water) or sticky traps, and use chemical pesticides only as a last resort, following label doses.",
                },
                Topic {
                    keywords: &["water", "irrigation", "drip", "watering"],
                    answer: "Water early in the morning or late evening to reduce evaporation. Drip irrigation saves 30-50% water compared to flood irrigation and keeps leaves dry, which limits disease.",
                },
                Topic {
                    keywords: &["soil", "ph", "testing"],
                    answer: "Get your soil tested every 2-3 years through the Soil Health Card scheme. Most crops prefer a pH of 6.0-7.5; lime raises pH and gypsum or organic matter helps in alkaline soils.",
                },
                Topic {
                    keywords: &["fertilizer", "fertiliser", "urea", "npk", "nitrogen"],
                    answer: "Apply fertilizer based on a soil test. Split nitrogen doses (basal, then top dressing) reduce losses. Combine chemical fertilizer with organic manure for long-term soil health.",
                },
                Topic {
                    keywords: &["disease", "fungus", "blight", "rot", "wilt"],
                    answer: "Remove and destroy infected plants, avoid overhead watering, and rotate crops. Copper-based fungicides help against many leaf blights; consult your local Krishi Vigyan Kendra for a diagnosis.",
                },
                Topic {
                    keywords: &["seed", "sowing", "germination"],
                    answer: "Use certified seed and treat it before sowing (for example with Trichoderma or a recommended fungicide). Sow at the recommended depth and spacing for your crop.",
                },
                Topic {
                    keywords: &["harvest", "storage", "store", "processing"],
                    answer: "Harvest at physiological maturity in dry weather. Dry grain to below 12% moisture before storage and use clean, airtight bags or bins to prevent pest damage.",
                },
            ],
            fallback: "I'm currently offline and couldn't reach the assistant. For urgent help, contact your local Krishi Vigyan Kendra or the Kisan Call Centre at 1800-180-1551.",
        }
    }

    /// Answer for the first topic whose keyword appears in `message`
    pub fn answer(&self, message: &str) -> &'static str {
        let message = message.to_lowercase();
        let words: Vec<&str> = message
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        self.topics
            .iter()
            .find(|topic| topic.keywords.iter().any(|k| words.contains(k)))
            .map(|topic| topic.answer)
            .unwrap_or(self.fallback)
    }
}

impl Default for LocalKnowledgeBase {
    fn default() -> Self {
        Self::new()
    }
}
