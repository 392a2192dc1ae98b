use clarity_mind::context::{Context, is_satisfied, missing_fields};
use clarity_mind::goals::GoalCatalog;

#[test]
fn test_gate_over_every_subset_of_required_fields() {
    let catalog = GoalCatalog::builtin();
    for goal in catalog.iter() {
        let fields = &goal.required_context;
        for mask in 0u32..(1 << fields.len()) {
            let mut ctx = Context::new();
            for (i, field) in fields.iter().enumerate() {
                if mask & (1 << i) != 0 {
                    ctx.set(field.clone(), "provided");
                }
            }
            let expected: Vec<String> = fields
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) == 0)
                .map(|(_, f)| f.clone())
                .collect();

            assert_eq!(missing_fields(goal, &ctx), expected, "{} mask {:b}", goal.id, mask);
            assert_eq!(is_satisfied(goal, &ctx), expected.is_empty());
        }
    }
}

#[test]
fn test_blank_values_do_not_satisfy_the_gate() {
    let catalog = GoalCatalog::builtin();
    let goal = catalog.get("GOAL_5_HYPOTHESIS").unwrap();
    let mut ctx = Context::new();
    ctx.set("hypothesis_statement", "   ");
    ctx.set("metric_to_move", serde_json::json!([]));
    assert_eq!(missing_fields(&goal, &ctx), ["hypothesis_statement", "metric_to_move"]);

    ctx.set("hypothesis_statement", "free delivery lifts repeat orders");
    ctx.set("metric_to_move", "repeat_rate");
    assert!(is_satisfied(&goal, &ctx));
}

#[test]
fn test_unrelated_fields_are_ignored() {
    let catalog = GoalCatalog::builtin();
    let goal = catalog.get("GOAL_2_PERFORMANCE").unwrap();
    let mut ctx = Context::new();
    ctx.set("product_concept", "meal kits");
    assert_eq!(missing_fields(&goal, &ctx).len(), goal.required_context.len());
}
