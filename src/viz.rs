//! SVG charts and console tables for a segmentation report

use std::path::{Path, PathBuf};

use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use tracing::info;

use crate::clean::PreprocessingReport;
use crate::pipeline::SegmentationReport;
use crate::recommend::Recommendation;

pub const SEGMENT_DISTRIBUTION_CHART: &str = "segment_distribution.svg";
pub const SEGMENT_REVENUE_CHART: &str = "segment_revenue.svg";
pub const CLUSTER_SCATTER_CHART: &str = "cluster_scatter.svg";
pub const CLUSTER_SIZE_CHART: &str = "cluster_sizes.svg";
pub const RFM_DISTRIBUTION_CHART: &str = "rfm_distributions.svg";
pub const RF_HEATMAP_CHART: &str = "rf_score_heatmap.svg";

const HISTOGRAM_BINS: usize = 30;

/// Draw a labelled vertical bar chart
///
/// # Arguments
/// * `bars` - `(label, value)` pairs, drawn left to right
/// * `output_path` - Path of the SVG file to write
/// * `title` - Chart caption
/// * `y_desc` - Y axis description
pub fn draw_bar_chart(
    bars: &[(String, f64)],
    output_path: &Path,
    title: &str,
    y_desc: &str,
) -> crate::Result<()> {
    if bars.is_empty() {
        anyhow::bail!("no bars to draw for chart '{title}'");
    }
    let max_value = bars.iter().map(|(_, v)| *v).fold(0.0, f64::max);
    let y_max = if max_value > 0.0 { max_value * 1.1 } else { 1.0 };

    let root = SVGBackend::new(output_path, (1100, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d((0..bars.len()).into_segmented(), 0f64..y_max)?;

    let label_of = |value: &SegmentValue<usize>| match value {
        SegmentValue::CenterOf(i) | SegmentValue::Exact(i) => {
            bars.get(*i).map(|(label, _)| label.clone()).unwrap_or_default()
        }
        SegmentValue::Last => String::new(),
    };
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(bars.len())
        .x_label_formatter(&label_of)
        .x_label_style(("sans-serif", 12))
        .y_desc(y_desc)
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    chart.draw_series(bars.iter().enumerate().map(|(i, (_, value))| {
        let color = Palette99::pick(i).to_rgba();
        let mut bar = Rectangle::new(
            [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), *value)],
            color.filled(),
        );
        bar.set_margin(0, 0, 8, 8);
        bar
    }))?;

    root.present()?;
    info!(path = %output_path.display(), "chart saved");
    Ok(())
}

/// Number of customers per segment
pub fn segment_distribution_chart(report: &SegmentationReport, output_path: &Path) -> crate::Result<()> {
    let bars: Vec<(String, f64)> = report
        .segments
        .iter()
        .map(|s| (s.segment.to_string(), s.customers as f64))
        .collect();
    draw_bar_chart(&bars, output_path, "Customers by Segment", "Customers")
}

/// Total monetary value per segment
pub fn segment_revenue_chart(report: &SegmentationReport, output_path: &Path) -> crate::Result<()> {
    let bars: Vec<(String, f64)> = report
        .segments
        .iter()
        .map(|s| (s.segment.to_string(), s.total_monetary))
        .collect();
    draw_bar_chart(&bars, output_path, "Revenue by Segment", "Total monetary value")
}

pub fn cluster_size_chart(report: &SegmentationReport, output_path: &Path) -> crate::Result<()> {
    let bars: Vec<(String, f64)> = report
        .model
        .cluster_sizes()
        .iter()
        .enumerate()
        .map(|(id, &size)| (format!("Cluster {id}"), size as f64))
        .collect();
    draw_bar_chart(&bars, output_path, "Cluster Sizes", "Customers")
}

/// Frequency against monetary value, one colour per cluster, centroids as crosses
pub fn cluster_scatter_chart(report: &SegmentationReport, output_path: &Path) -> crate::Result<()> {
    let customers = &report.customers;
    let centroids = report.model.raw_centroids();

    let freq_max = customers
        .iter()
        .map(|c| c.metrics.frequency as f64)
        .fold(1.0, f64::max);
    let mon_max = customers
        .iter()
        .map(|c| c.metrics.monetary)
        .fold(1.0, f64::max);

    let root = SVGBackend::new(output_path, (900, 650)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            "Customer Segmentation: Frequency vs Monetary (Colored by Cluster)",
            ("sans-serif", 24),
        )
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(0f64..freq_max * 1.05, 0f64..mon_max * 1.05)?;

    chart
        .configure_mesh()
        .x_desc("Frequency")
        .y_desc("Monetary")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for cluster in 0..report.model.n_clusters {
        let color = Palette99::pick(cluster).to_rgba();
        chart
            .draw_series(
                customers
                    .iter()
                    .filter(|c| c.cluster_id == Some(cluster))
                    .map(|c| {
                        Circle::new(
                            (c.metrics.frequency as f64, c.metrics.monetary),
                            3,
                            color.mix(0.6).filled(),
                        )
                    }),
            )?
            .label(format!("Cluster {cluster}"))
            .legend(move |(x, y)| Circle::new((x, y), 4, color.filled()));
    }

    chart
        .draw_series(
            centroids
                .outer_iter()
                .map(|row| Cross::new((row[1], row[2]), 8, BLACK.stroke_width(2))),
        )?
        .label("Centroid")
        .legend(|(x, y)| Cross::new((x, y), 5, BLACK.stroke_width(2)));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    info!(path = %output_path.display(), "chart saved");
    Ok(())
}

/// Equal-width histogram. Returns the lower edge, bin width and per-bin counts,
/// or `None` when there are no finite values.
pub fn histogram(values: &[f64], bins: usize) -> Option<(f64, f64, Vec<usize>)> {
    let finite = || values.iter().copied().filter(|v| v.is_finite());
    let min = finite().reduce(f64::min)?;
    let max = finite().reduce(f64::max)?;
    let bins = bins.max(1);
    // A constant column still gets one visible bar
    let (lower, upper) = if max > min { (min, max) } else { (min - 0.5, max + 0.5) };
    let width = (upper - lower) / bins as f64;

    let mut counts = vec![0; bins];
    for v in finite() {
        let bin = (((v - lower) / width) as usize).min(bins - 1);
        counts[bin] += 1;
    }
    Some((lower, width, counts))
}

/// Customers per (R score, F score) pair, indexed `[r - 1][f - 1]`
pub fn rf_score_grid(report: &SegmentationReport) -> [[usize; 5]; 5] {
    let mut grid = [[0; 5]; 5];
    for c in &report.customers {
        let r = usize::from(c.scores.r).wrapping_sub(1);
        let f = usize::from(c.scores.f).wrapping_sub(1);
        if let Some(cell) = grid.get_mut(r).and_then(|row| row.get_mut(f)) {
            *cell += 1;
        }
    }
    grid
}

/// Histograms of recency, frequency, monetary and combined RFM score, each
/// with its mean marked
pub fn rfm_distribution_chart(report: &SegmentationReport, output_path: &Path) -> crate::Result<()> {
    let customers = &report.customers;
    let panels: [(&str, Vec<f64>, RGBColor); 4] = [
        (
            "Recency (days)",
            customers.iter().map(|c| c.metrics.recency as f64).collect(),
            BLUE,
        ),
        (
            "Frequency",
            customers.iter().map(|c| c.metrics.frequency as f64).collect(),
            GREEN,
        ),
        (
            "Monetary",
            customers.iter().map(|c| c.metrics.monetary).collect(),
            MAGENTA,
        ),
        (
            "RFM score",
            customers.iter().map(|c| c.rfm_score).collect(),
            CYAN,
        ),
    ];

    let root = SVGBackend::new(output_path, (1200, 900)).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled("RFM Distributions", ("sans-serif", 28))?;

    for (area, (name, values, color)) in root.split_evenly((2, 2)).iter().zip(panels) {
        let Some((lower, width, counts)) = histogram(&values, HISTOGRAM_BINS) else {
            anyhow::bail!("no values to plot for {name}");
        };
        let upper = lower + width * counts.len() as f64;
        let y_max = counts.iter().copied().max().unwrap_or(0).max(1) as f64 * 1.1;
        let mean = values.iter().sum::<f64>() / values.len() as f64;

        let mut chart = ChartBuilder::on(area)
            .caption(format!("Distribution of {name}"), ("sans-serif", 18))
            .margin(10)
            .x_label_area_size(35)
            .y_label_area_size(50)
            .build_cartesian_2d(lower..upper, 0f64..y_max)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_desc(name)
            .y_desc("Customers")
            .draw()?;

        chart.draw_series(counts.iter().enumerate().map(|(i, &count)| {
            let x0 = lower + width * i as f64;
            Rectangle::new([(x0, 0.0), (x0 + width, count as f64)], color.mix(0.7).filled())
        }))?;

        chart
            .draw_series(LineSeries::new(
                vec![(mean, 0.0), (mean, y_max)],
                RED.stroke_width(2),
            ))?
            .label(format!("Mean: {mean:.2}"))
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 15, y)], RED.stroke_width(2)));

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }

    root.present()?;
    info!(path = %output_path.display(), "chart saved");
    Ok(())
}

/// Customer counts for every R score and F score pair
pub fn rf_heatmap_chart(report: &SegmentationReport, output_path: &Path) -> crate::Result<()> {
    let grid = rf_score_grid(report);
    let max_count = grid.iter().flatten().copied().max().unwrap_or(0).max(1) as f64;

    let root = SVGBackend::new(output_path, (750, 650)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Customer Count by R Score and F Score", ("sans-serif", 24))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(50)
        .build_cartesian_2d(0.5f64..5.5f64, 0.5f64..5.5f64)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(5)
        .y_labels(5)
        .x_label_formatter(&|v| format!("{v:.0}"))
        .y_label_formatter(&|v| format!("{v:.0}"))
        .x_desc("F score")
        .y_desc("R score")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    let cells = || {
        (1..=5usize).flat_map(|r| (1..=5usize).map(move |f| (r, f, grid[r - 1][f - 1])))
    };
    chart.draw_series(cells().map(|(r, f, count)| {
        let (x, y) = (f as f64, r as f64);
        let shade = 0.08 + 0.92 * count as f64 / max_count;
        Rectangle::new([(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)], BLUE.mix(shade).filled())
    }))?;

    let centered = TextStyle::from(("sans-serif", 18).into_font())
        .pos(Pos::new(HPos::Center, VPos::Center));
    chart.draw_series(cells().map(|(r, f, count)| {
        Text::new(count.to_string(), (f as f64, r as f64), centered.clone())
    }))?;

    root.present()?;
    info!(path = %output_path.display(), "chart saved");
    Ok(())
}

/// Render every chart into `output_dir`, returning the files written
pub fn render_charts(report: &SegmentationReport, output_dir: &Path) -> crate::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;

    let charts: [(&str, fn(&SegmentationReport, &Path) -> crate::Result<()>); 6] = [
        (SEGMENT_DISTRIBUTION_CHART, segment_distribution_chart),
        (SEGMENT_REVENUE_CHART, segment_revenue_chart),
        (CLUSTER_SCATTER_CHART, cluster_scatter_chart),
        (CLUSTER_SIZE_CHART, cluster_size_chart),
        (RFM_DISTRIBUTION_CHART, rfm_distribution_chart),
        (RF_HEATMAP_CHART, rf_heatmap_chart),
    ];

    let mut written = Vec::with_capacity(charts.len());
    for (file_name, draw) in charts {
        let path = output_dir.join(file_name);
        draw(report, &path)?;
        written.push(path);
    }
    Ok(written)
}

pub fn print_preprocessing_report(report: &PreprocessingReport) {
    let quality = &report.quality;
    println!("\n=== Data Quality ===");
    for missing in &quality.missing_values {
        println!(
            "  Missing {:<20} {:>8} ({:.2}%)",
            missing.column, missing.missing_count, missing.missing_percentage
        );
    }
    println!(
        "  Duplicate records            {:>8} ({:.2}%)",
        quality.duplicate_records, quality.duplicate_percentage
    );
    if let Some(outliers) = &quality.amount_outliers {
        println!(
            "  Amount outliers              {:>8} ({:.2}%) outside [{:.2}, {:.2}]",
            outliers.outlier_count,
            outliers.outlier_percentage,
            outliers.lower_bound,
            outliers.upper_bound
        );
    }

    let cleaning = &report.cleaning;
    println!("\n=== Data Cleaning ===");
    let rows = [
        ("Input rows", cleaning.input_rows),
        ("Missing fields removed", cleaning.missing_fields),
        ("Duplicates removed", cleaning.duplicates),
        ("Future-dated removed", cleaning.future_dated),
        ("Very old dates kept", cleaning.very_old_dates),
        ("Negative amounts removed", cleaning.negative_amounts),
        ("Zero amounts removed", cleaning.zero_amounts),
        ("Outliers capped", cleaning.outliers_capped),
        ("Output rows", cleaning.output_rows),
    ];
    for (name, count) in rows {
        println!("  {name:<26} {count:>8}");
    }

    let status = if report.validation.validation_passed {
        "passed"
    } else {
        "FAILED"
    };
    println!("\nValidation: {status}");
}

/// Print segment and cluster tables to the console
pub fn print_segment_statistics(report: &SegmentationReport) {
    println!("\n=== RFM Segments ===");
    println!("Analysis date: {}", report.analysis_date);
    println!("Total customers: {}", report.customers.len());
    println!(
        "\n  {:<20} | {:>9} | {:>7} | {:>8} | {:>9} | {:>10} | {:>12} | {:>5}",
        "Segment", "Customers", "Share", "Recency", "Frequency", "Monetary", "Revenue", "Score"
    );
    println!("  {}", "-".repeat(101));
    for s in &report.segments {
        println!(
            "  {:<20} | {:>9} | {:>6.2}% | {:>8.1} | {:>9.2} | {:>10.2} | {:>12.2} | {:>5.2}",
            s.segment.label(),
            s.customers,
            s.percentage,
            s.mean_recency,
            s.mean_frequency,
            s.mean_monetary,
            s.total_monetary,
            s.mean_rfm_score
        );
    }

    let model = &report.model;
    println!("\n=== Cluster Statistics ===");
    println!("Number of clusters: {}", model.n_clusters);
    println!("Silhouette score: {:.3}", model.silhouette);
    println!("Seed: {}", model.seed);
    println!("Within-cluster sum of squares (Inertia): {:.2}", model.inertia);
    if model.candidates.len() > 1 {
        println!("\nCandidates:");
        for c in &model.candidates {
            println!("  k = {:2}: silhouette {:.3}, inertia {:.2}", c.k, c.silhouette, c.inertia);
        }
    }

    println!(
        "\n  {:>7} | {:>9} | {:>7} | {:>8} | {:>9} | {:>10} | {:>12}",
        "Cluster", "Customers", "Share", "Recency", "Frequency", "Monetary", "Revenue"
    );
    println!("  {}", "-".repeat(80));
    for c in &report.clusters {
        println!(
            "  {:>7} | {:>9} | {:>6.2}% | {:>8.1} | {:>9.2} | {:>10.2} | {:>12.2}",
            c.cluster_id,
            c.customers,
            c.percentage,
            c.mean_recency,
            c.mean_frequency,
            c.mean_monetary,
            c.total_monetary
        );
    }
}

pub fn print_recommendations(recommendations: &[Recommendation]) {
    println!("\n=== Recommendations ===");
    for rec in recommendations {
        println!("\n{}: {}", rec.segment, rec.description);
        println!("  Strategy: {}", rec.strategy);
        for action in rec.actions {
            println!("  - {action}");
        }
    }
}
