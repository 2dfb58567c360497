//! crates/pettrack_core/src/clarify.rs
//!
//! Decides which follow-up questions a logging event should raise about a
//! food profile, in priority order with a hard cap of two per event.

use crate::domain::Food;

/// A question the user should be asked, targeting one food column.
#[derive(Debug, Clone)]
pub struct PendingQuestion {
    pub field: String,
    pub question: String,
    pub priority: i32,
}

/// Builds the question list for a logging event. Priority 0 is identity
/// (which food, or which variant), 1 is serving weight, 2 is calorie
/// density. At most two questions survive, lowest priority value first.
pub fn generate_clarifications(food: &Food, candidates: Option<&[Food]>) -> Vec<PendingQuestion> {
    let mut questions = Vec::new();

    if let Some(shortlist) = candidates.filter(|c| c.len() > 1) {
        let names = shortlist
            .iter()
            .map(|c| format!("\"{}\"", c.canonical_name))
            .collect::<Vec<_>>()
            .join(" or ");
        questions.push(PendingQuestion {
            field: "variant".to_string(),
            question: format!("Which one did you mean: {names}?"),
            priority: 0,
        });
    } else if food.variant.as_deref().map_or(true, str::is_empty) {
        if let Some(brand) = food.brand.as_deref().filter(|b| !b.is_empty()) {
            questions.push(PendingQuestion {
                field: "variant".to_string(),
                question: format!("What variant of {brand} is this? (e.g. Adult Chicken, Puppy Lamb)"),
                priority: 0,
            });
        }
    }

    if food.serving_weight_g.is_none() {
        if let Some(unit) = food.serving_unit.as_deref().filter(|u| !u.is_empty()) {
            questions.push(PendingQuestion {
                field: "serving_weight_g".to_string(),
                question: format!("How many grams is one {unit}? (weigh it once for accurate tracking)"),
                priority: 1,
            });
        }
    }

    if food.kcal_per_100g.is_none() {
        questions.push(PendingQuestion {
            field: "kcal_per_100g".to_string(),
            question: format!(
                "What's the kcal/100g for {}? (check the guaranteed analysis on the packet)",
                food.canonical_name
            ),
            priority: 2,
        });
    }

    questions.sort_by_key(|q| q.priority);
    questions.truncate(2);
    questions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FoodSource;
    use chrono::Utc;
    use uuid::Uuid;

    fn food(brand: Option<&str>, variant: Option<&str>) -> Food {
        Food {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            canonical_name: "Acana Adult".to_string(),
            brand: brand.map(str::to_string),
            variant: variant.map(str::to_string),
            aliases: Vec::new(),
            serving_unit: None,
            serving_weight_g: None,
            kcal_per_100g: None,
            kcal_per_item: None,
            protein_pct: None,
            fat_pct: None,
            fibre_pct: None,
            moisture_pct: None,
            ash_pct: None,
            source: FoodSource::Manual,
            completeness_score: 0.0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn a_shortlist_asks_which_food_was_meant() {
        let a = food(Some("Acana"), Some("Adult"));
        let mut b = food(Some("Acana"), Some("Puppy"));
        b.canonical_name = "Acana Puppy".to_string();
        let questions = generate_clarifications(&a, Some(&[a.clone(), b]));
        assert_eq!(questions[0].priority, 0);
        assert_eq!(questions[0].field, "variant");
        assert_eq!(
            questions[0].question,
            "Which one did you mean: \"Acana Adult\" or \"Acana Puppy\"?"
        );
    }

    #[test]
    fn a_single_candidate_shortlist_is_not_ambiguous() {
        let a = food(Some("Acana"), Some("Adult"));
        let questions = generate_clarifications(&a, Some(&[a.clone()]));
        assert!(questions.iter().all(|q| !q.question.starts_with("Which one")));
    }

    #[test]
    fn branded_food_without_variant_asks_for_the_variant() {
        let f = food(Some("Acana"), None);
        let questions = generate_clarifications(&f, None);
        assert_eq!(questions[0].field, "variant");
        assert_eq!(
            questions[0].question,
            "What variant of Acana is this? (e.g. Adult Chicken, Puppy Lamb)"
        );
    }

    #[test]
    fn brandless_food_skips_the_variant_question() {
        let f = food(None, None);
        let questions = generate_clarifications(&f, None);
        assert!(questions.iter().all(|q| q.field != "variant"));
    }

    #[test]
    fn missing_serving_weight_is_only_asked_with_a_known_unit() {
        let mut f = food(None, Some("Adult"));
        f.kcal_per_100g = Some(380.0);
        assert!(generate_clarifications(&f, None).is_empty());

        f.serving_unit = Some("scoop".to_string());
        let questions = generate_clarifications(&f, None);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].field, "serving_weight_g");
        assert_eq!(questions[0].priority, 1);
    }

    #[test]
    fn sparse_profile_keeps_the_two_most_urgent_questions() {
        let mut f = food(Some("Acana"), None);
        f.serving_unit = Some("scoop".to_string());
        let questions = generate_clarifications(&f, None);
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].priority, 0);
        assert_eq!(questions[1].priority, 1);
        assert!(questions.iter().all(|q| q.field != "kcal_per_100g"));
    }

    #[test]
    fn unknown_density_is_asked_when_room_remains() {
        let f = food(None, Some("Adult"));
        let questions = generate_clarifications(&f, None);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].field, "kcal_per_100g");
        assert_eq!(questions[0].priority, 2);
        assert_eq!(
            questions[0].question,
            "What's the kcal/100g for Acana Adult? (check the guaranteed analysis on the packet)"
        );
    }

    #[test]
    fn complete_profile_raises_nothing() {
        let mut f = food(Some("Acana"), Some("Adult"));
        f.serving_unit = Some("scoop".to_string());
        f.serving_weight_g = Some(50.0);
        f.kcal_per_100g = Some(380.0);
        assert!(generate_clarifications(&f, None).is_empty());
    }
}
