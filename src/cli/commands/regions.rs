//! List the regions of a set.

use console::style;

use osrm_prep::config::Settings;
use osrm_prep::regions::RegionSet;

use crate::cli::progress::format_delay;

pub fn cmd_regions(settings: &Settings, set: RegionSet) {
    let regions = set.regions();
    let policy = settings.retry_policy(set);
    let config = settings.pipeline_config(set);

    println!(
        "{} {} regions from {}",
        style("→").cyan(),
        regions.len(),
        config.base_url
    );
    for region in &regions {
        println!("  {}", region);
    }
    println!();
    println!(
        "{} {} attempts, {} initial backoff x{}, {} timeout, {} between regions",
        style("→").dim(),
        policy.total_attempts(),
        format_delay(policy.delay_after(0)),
        policy.backoff_multiplier,
        format_delay(policy.timeout()),
        format_delay(config.pacing)
    );
}
