//! Build the combined dataset.

use console::style;

use osrm_prep::config::Settings;
use osrm_prep::services::merge::{merge, MergeOptions, MergeStep};
use osrm_prep::services::DockerToolchain;

pub async fn cmd_merge(
    settings: &Settings,
    combined_name: String,
    template: Option<String>,
    final_step: MergeStep,
) -> anyhow::Result<()> {
    let toolchain = DockerToolchain::new(settings.toolchain.clone());
    toolchain.ensure_available()?;

    let options = MergeOptions {
        combined_name,
        template,
        final_step,
    };

    println!(
        "{} Building {} from region graphs in {}",
        style("→").cyan(),
        style(&options.combined_name).bold(),
        settings.data_dir.display()
    );

    let report = merge(&settings.data_dir, &options, &toolchain).await?;

    println!(
        "  {} seeded from {} ({} files)",
        style("✓").green(),
        report.template,
        report.files_copied.len()
    );
    println!(
        "{} {} finished with {}",
        style("✓").green(),
        report.combined_graph,
        options.final_step.tool_step()
    );

    Ok(())
}
