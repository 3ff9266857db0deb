use l3ha_core::ControlPlane;
use l3ha_topology::{Recommendation, TopologyOptimizer};

pub fn optimize<C: ControlPlane>(client: &C, agent_type: &str, format: &str) -> anyhow::Result<u8> {
    let advice = TopologyOptimizer::new(client, agent_type).run()?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&advice)?);
        }
        _ => {
            for item in &advice {
                if let Recommendation::Move { agent_id } = &item.recommendation {
                    println!("{} {} -> {}", item.router_id, item.agent_id, agent_id);
                }
            }
        }
    }
    Ok(0)
}
