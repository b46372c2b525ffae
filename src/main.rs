//! rfm-segment: customer segmentation from transaction history
//!
//! Loads or generates transactions, cleans them, scores and segments every
//! customer, clusters the RFM features and writes reports and charts.

use std::time::Instant;

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use rfm_segment::{
    export_report, generate_sample_transactions, into_transactions, load_transactions,
    preprocess, recommendations_for, run_pipeline, viz, write_preprocessing_report, Args,
    PreprocessingReport, RawTransaction, SegmentationConfig, SegmentationReport, Transaction,
};
use tracing::info;

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let prediction = args.parse_rfm_values()?;
    let config = args.resolve_config()?;
    let start_time = Instant::now();

    let (transactions, preprocessing) = load_input(&args, &config)?;
    let report = run_pipeline(&transactions, &config)?;

    match prediction {
        Some(rfm_values) => run_prediction_mode(&report, rfm_values)?,
        None => write_outputs(&args, &report, preprocessing.as_ref())?,
    }

    info!(elapsed_secs = start_time.elapsed().as_secs_f64(), "done");
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();
}

/// Read the CSV or generate sample data, then assess, clean and validate it
/// unless told not to
fn load_input(
    args: &Args,
    config: &SegmentationConfig,
) -> Result<(Vec<Transaction>, Option<PreprocessingReport>)> {
    let raw: Vec<RawTransaction> = match &args.input {
        Some(path) => {
            info!(path = %path.display(), "loading transactions");
            load_transactions(path)?
        }
        None => {
            info!(seed = config.seed, "generating sample transactions");
            generate_sample_transactions(config.seed)?
                .into_iter()
                .map(RawTransaction::from)
                .collect()
        }
    };

    if args.no_clean {
        return Ok((into_transactions(&raw)?, None));
    }
    let now = Local::now().naive_local();
    let (transactions, preprocessing) = preprocess(&raw, now, &config.cleaning)?;
    viz::print_preprocessing_report(&preprocessing);
    Ok((transactions, Some(preprocessing)))
}

/// Assign a single customer's raw metrics to the fitted clusters
fn run_prediction_mode(report: &SegmentationReport, rfm_values: [f64; 3]) -> Result<()> {
    println!("=== Prediction Mode ===");
    println!(
        "Input RFM values: R={}, F={}, M={}",
        rfm_values[0], rfm_values[1], rfm_values[2]
    );

    let model = &report.model;
    let cluster = model.predict(&rfm_values)?;
    println!("\nPredicted Cluster: {}", cluster);

    let cluster_sizes = model.cluster_sizes();
    let total_customers = report.customers.len();
    let cluster_percentage = (cluster_sizes[cluster] as f64 / total_customers as f64) * 100.0;
    println!("\nCluster {} details:", cluster);
    println!(
        "  Size: {} customers ({:.1}% of total)",
        cluster_sizes[cluster], cluster_percentage
    );

    let raw_centroids = model.raw_centroids();
    println!(
        "  Centroid: R={:.1}, F={:.2}, M={:.2}",
        raw_centroids[[cluster, 0]],
        raw_centroids[[cluster, 1]],
        raw_centroids[[cluster, 2]]
    );
    if let Some(summary) = report.clusters.iter().find(|c| c.cluster_id == cluster) {
        println!(
            "  Recency {}..{} days, frequency {}..{}, monetary {:.2}..{:.2}",
            summary.min_recency,
            summary.max_recency,
            summary.min_frequency,
            summary.max_frequency,
            summary.min_monetary,
            summary.max_monetary
        );
    }
    Ok(())
}

fn write_outputs(
    args: &Args,
    report: &SegmentationReport,
    preprocessing: Option<&PreprocessingReport>,
) -> Result<()> {
    viz::print_segment_statistics(report);

    let recommendations = recommendations_for(&report.segments);
    viz::print_recommendations(&recommendations);

    let exported = export_report(report, &recommendations, &args.output_dir)?;
    println!("\n=== Outputs ===");
    for path in &exported {
        println!("  {}", path.display());
    }
    if let Some(preprocessing) = preprocessing {
        let path = write_preprocessing_report(preprocessing, &args.output_dir)?;
        println!("  {}", path.display());
    }

    if !args.no_charts {
        for path in viz::render_charts(report, &args.output_dir)? {
            println!("  {}", path.display());
        }
    }
    Ok(())
}
