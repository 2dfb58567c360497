//! services/api/src/web/parse.rs
//!
//! Model-boundary calls for the logging pipeline: turning one raw feeding
//! description into a structured utterance, and the best-effort nutrition
//! lookup for newly registered foods.

use pettrack_core::domain::{ChatTurn, Food, NutritionFacts, ParsedUtterance, ProviderCredentials};
use pettrack_core::ports::{CompletionOptions, CompletionService, PortError, PortResult};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

const PARSER_SYSTEM_PROMPT: &str = r#"You are a pet food input parser. Extract structured data from natural language food logging.

Known foods for this user: {known_foods}

Return ONLY valid JSON matching this schema:
{
  "brand_guess": string | null,
  "variant_guess": string | null,
  "quantity": number,
  "unit": string,
  "weight_g": number | null,
  "meal_type": string | null,
  "confidence": number
}

Rules:
- quantity defaults to 1 if not specified
- unit should be normalized: "scoop", "cup", "pouch", "piece", "handful", "g", "kg"
- meal_type can be "breakfast", "lunch", "dinner", "treat", "snack", or null
- confidence is 0-1 based on how sure you are about the match
- If a known food alias matches the input, use that food's brand/variant and set high confidence
- If the input is vague or ambiguous, set confidence low"#;

const NUTRITION_SYSTEM_PROMPT: &str = r#"You are a pet food nutrition database. Look up the guaranteed analysis for the given dog food.
Return ONLY valid JSON matching this schema:
{
  "kcal_per_100g": number | null,
  "protein_pct": number | null,
  "fat_pct": number | null,
  "fibre_pct": number | null,
  "moisture_pct": number | null,
  "confident": boolean
}
If you're not confident about the data, set "confident" to false and null for fields you're unsure about."#;

/// Corrective follow-up sent when the model's reply fails to decode.
pub const JSON_RETRY_NUDGE: &str = "Your response was not valid JSON. Please respond with ONLY a JSON object, no markdown fences or extra text.";

/// How many corrective retries a JSON-decoding call site gets.
pub const MAX_JSON_RETRIES: usize = 1;

/// Strips a single surrounding markdown code fence, if present.
pub fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let fence = Regex::new(r"(?s)^```(?:json)?\s*\n?(.*?)\n?\s*```$").unwrap();
    match fence.captures(trimmed).and_then(|caps| caps.get(1)) {
        Some(body) => body.as_str().trim(),
        None => trimmed,
    }
}

/// The slice of the catalog the parser prompt carries. Enough to anchor
/// brand/variant guesses without shipping whole food rows.
#[derive(Serialize)]
struct KnownFood<'a> {
    canonical_name: &'a str,
    brand: Option<&'a str>,
    variant: Option<&'a str>,
    aliases: &'a [String],
}

fn known_food_digest(foods: &[Food]) -> PortResult<String> {
    let digest: Vec<KnownFood> = foods
        .iter()
        .map(|f| KnownFood {
            canonical_name: &f.canonical_name,
            brand: f.brand.as_deref(),
            variant: f.variant.as_deref(),
            aliases: &f.aliases,
        })
        .collect();
    serde_json::to_string(&digest).map_err(|e| PortError::Unexpected(e.to_string()))
}

/// Parses one raw feeding description into a structured utterance.
///
/// Malformed model output gets exactly one corrective retry: the bad reply is
/// appended to the conversation together with a nudge, and the model is asked
/// again. A second failure fails the operation.
pub async fn parse_utterance(
    completions: &dyn CompletionService,
    credentials: &ProviderCredentials,
    raw_input: &str,
    foods: &[Food],
) -> PortResult<ParsedUtterance> {
    let system_prompt = PARSER_SYSTEM_PROMPT.replace("{known_foods}", &known_food_digest(foods)?);

    let mut options = CompletionOptions::new(credentials.model.clone());
    options.max_tokens = 200;

    let mut turns = vec![ChatTurn::user(raw_input)];
    let mut attempt = 0;
    loop {
        let raw = completions
            .complete(&credentials.api_key, &system_prompt, &turns, &options)
            .await?;

        match serde_json::from_str::<ParsedUtterance>(strip_markdown_fences(&raw)) {
            Ok(parsed) => return Ok(parsed),
            Err(e) => {
                if attempt >= MAX_JSON_RETRIES {
                    return Err(PortError::Provider(format!(
                        "Input parser produced malformed JSON after {} attempts: {}",
                        attempt + 1,
                        e
                    )));
                }
                warn!("Input parser produced malformed JSON, retrying with nudge: {}", e);
                attempt += 1;
                turns.push(ChatTurn::assistant(raw));
                turns.push(ChatTurn::user(JSON_RETRY_NUDGE));
            }
        }
    }
}

/// Best-effort guaranteed-analysis lookup for a newly registered food.
///
/// Never fails the caller: provider errors, malformed output, and
/// low-confidence answers all come back as `None`, and the pipeline falls
/// back to asking the user instead.
pub async fn lookup_nutrition(
    completions: &dyn CompletionService,
    credentials: &ProviderCredentials,
    canonical_name: &str,
    brand: Option<&str>,
    variant: Option<&str>,
) -> Option<NutritionFacts> {
    let query = [brand, variant, Some(canonical_name)]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let mut options = CompletionOptions::new(credentials.model.clone());
    options.max_tokens = 200;

    let turns = [ChatTurn::user(format!("Look up nutrition for: {query} dog food"))];
    let raw = match completions
        .complete(&credentials.api_key, NUTRITION_SYSTEM_PROMPT, &turns, &options)
        .await
    {
        Ok(raw) => raw,
        Err(e) => {
            debug!("Nutrition lookup call failed: {}", e);
            return None;
        }
    };

    let facts = match serde_json::from_str::<NutritionFacts>(strip_markdown_fences(&raw)) {
        Ok(facts) => facts,
        Err(e) => {
            debug!("Nutrition lookup produced malformed JSON: {}", e);
            return None;
        }
    };

    // Only adopt figures the model stands behind; a missing calorie density
    // makes the rest useless for entry math.
    if !facts.confident || facts.kcal_per_100g.is_none() {
        return None;
    }
    Some(facts)
}
