use arena_application::provider::{GAME_RULES, GameRules, StandardRules};
use arena_application::{AppContext, CapabilityRegistry, SelectionRule};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // v1 为默认规则；v2 先按 30% 灰度放量
    let registry = CapabilityRegistry::builder()
        .register::<dyn GameRules>(
            GAME_RULES,
            "v1",
            Arc::new(StandardRules::new(25)) as Arc<dyn GameRules>,
            SelectionRule::Default,
        )
        .register::<dyn GameRules>(
            GAME_RULES,
            "v2",
            Arc::new(StandardRules::new(50)) as Arc<dyn GameRules>,
            SelectionRule::Rollout { percent: 30 },
        )
        .build()?;

    // 同一聚合在灰度期间始终命中同一版本（分流键稳定散列）
    for n in 0..8 {
        let ctx = AppContext::for_aggregate(format!("reg-{n}"));
        let rules = registry.resolve::<dyn GameRules>(GAME_RULES, &ctx)?;
        let bonus = rules.verification_bonus("chess").await?;
        let version = if bonus == 50 { "v2" } else { "v1" };
        println!("reg-{n}: {version} (bonus={bonus})");
    }

    // 运维钉选：无视灰度比例，强制走 v2
    let pinned = AppContext::for_aggregate("reg-0").with_override(GAME_RULES, "v2");
    let rules = registry.resolve::<dyn GameRules>(GAME_RULES, &pinned)?;
    println!("pinned reg-0: bonus={}", rules.verification_bonus("chess").await?);

    // 全量放开：原子替换快照，后续解析全部命中 v2
    registry.reload(CapabilityRegistry::builder().register::<dyn GameRules>(
        GAME_RULES,
        "v2",
        Arc::new(StandardRules::new(50)) as Arc<dyn GameRules>,
        SelectionRule::Default,
    ))?;
    let ctx = AppContext::for_aggregate("reg-3");
    let rules = registry.resolve::<dyn GameRules>(GAME_RULES, &ctx)?;
    println!("after reload reg-3: bonus={}", rules.verification_bonus("chess").await?);

    Ok(())
}
