use kafka_cluster_balancer::*;

use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("kafka_cluster_balancer=info")),
        )
        .init();

    println!("Kafka Cluster Balancer - Example Usage\n");

    // Optional args: <cluster.json> [constraints.json]
    let args: Vec<String> = std::env::args().skip(1).collect();
    let metadata = match args.first() {
        Some(path) => ClusterMetadata::from_json_file(Path::new(path))?,
        None => create_sample_cluster(),
    };
    let constraints = match args.get(1) {
        Some(path) => BalancingConstraints::from_json_file(Path::new(path))?,
        None => BalancingConstraints::default().with_budget(10, 10),
    };

    let rebalancer = Rebalancer::new(constraints)?;

    println!("=== Current Balance ===");
    for report in rebalancer.goal_report(&metadata)? {
        println!("  {}", report.summary());
    }

    let mut coordinator = InMemoryCoordinator::new(metadata);
    println!("\n=== Generating Rebalance Plan ===");
    let plan = rebalancer.run(&mut coordinator, true)?;
    println!("{}\n", plan.summary);

    if plan.is_empty() {
        println!("No rebalancing needed - cluster is already balanced!");
        return Ok(());
    }

    println!("Imbalance before: {}", plan.initial_stats);
    println!("Imbalance after:  {}", plan.final_stats);

    for result in &plan.goal_results {
        println!(
            "\n{}: {} -> {} ({} actions)",
            result.goal_name,
            result.score_before,
            result.score_after,
            result.actions.len()
        );
        for action in result.actions.iter().take(10) {
            println!("  {}", action.description());
        }
        if result.actions.len() > 10 {
            println!("  ... and {} more actions", result.actions.len() - 10);
        }
    }

    println!("\n=== Submitted Reassignment ===");
    println!("{}", plan.proposed.to_json()?);

    coordinator.complete_reassignment()?;
    let after = Rebalancer::new(BalancingConstraints::default())?.goal_report(coordinator.metadata())?;
    println!("\n=== Balance After Reassignment ===");
    for report in after {
        println!("  {}", report.summary());
    }

    Ok(())
}

/// Six brokers over three racks, with most replicas crowded onto rack-0 and
/// broker 5 down
fn create_sample_cluster() -> ClusterMetadata {
    let mut builder = ClusterMetadata::builder()
        .broker(0, "rack-0")
        .broker(1, "rack-0")
        .broker(2, "rack-1")
        .broker(3, "rack-1")
        .broker(4, "rack-2")
        .dead_broker(5, "rack-2");

    for p in 0..8 {
        builder = builder.partition("orders", p, [p % 2, (p + 1) % 2]);
    }
    for p in 0..4 {
        builder = builder.partition("payments", p, [0, 2, 5]);
    }
    builder.build()
}
