use std::fs::{self, File};
use std::io::{self, Write};
use std::panic;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueHint};
use glucose_radial::breakfast::breakfast_days;
use glucose_radial::food_log::count_missing_begin_times;
use glucose_radial::glucose::count_invalid_timestamps;
use glucose_radial::polar::{build_polar_chart, finite_extent, ChartLayout, PolarChart};
use glucose_radial::{
    expected_inputs, load_study, Study, StudyConfig, SubjectId, DEFAULT_SUBJECT,
    SUBJECT_ID_RANGE,
};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::{FontDesc, FontFamily, FontStyle, FontTransform};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const TRACE_COLOR: RGBColor = RGBColor(70, 130, 180);
const GRID_COLOR: RGBColor = RGBColor(204, 204, 204);
const SPOKE_COLOR: RGBColor = RGBColor(221, 221, 221);
const CURVE_STEPS_PER_SEGMENT: usize = 12;

#[derive(Parser, Debug)]
#[command(author, version, about = "Radial time-of-day glucose charts from CGM exports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render one subject's 24-hour glucose trace as a radial chart
    Render(RenderArgs),
    /// Write a per-subject report of glucose series and breakfast days
    Summary(SummaryArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Study directory holding Demographics.csv, dexcom/ and food_log/
    #[arg(long, default_value = "../data", value_hint = ValueHint::DirPath)]
    data_dir: PathBuf,

    /// Subject id to render
    #[arg(
        long,
        default_value_t = DEFAULT_SUBJECT.0,
        value_parser = clap::value_parser!(u16).range(1..=16)
    )]
    subject: u16,

    /// Output SVG path
    #[arg(short, long, default_value = "polar_chart.svg", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Also render a PNG
    #[arg(long, value_hint = ValueHint::FilePath)]
    png: Option<PathBuf>,

    /// Write the chart geometry as JSON
    #[arg(long, value_hint = ValueHint::FilePath)]
    scene_json: Option<PathBuf>,

    /// Write per-day breakfast flags for every subject as CSV (`-` for stdout)
    #[arg(long, value_hint = ValueHint::FilePath)]
    breakfast_csv: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,

    /// Profile major stages with timings
    #[arg(long, action = ArgAction::SetTrue)]
    profile: bool,
}

#[derive(Parser, Debug)]
struct SummaryArgs {
    /// Study directory holding Demographics.csv, dexcom/ and food_log/
    #[arg(long, default_value = "../data", value_hint = ValueHint::DirPath)]
    data_dir: PathBuf,

    /// Output report path (`-` for stdout)
    #[arg(short, long, default_value = "study_summary.txt", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = match &cli.command {
        Command::Render(args) => args.verbose,
        Command::Summary(args) => args.verbose,
    };
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Render(args) => handle_render(args),
        Command::Summary(args) => handle_summary(args),
    }
}

fn load_checked(data_dir: &Path) -> Result<Study> {
    let config = StudyConfig::with_data_dir(data_dir);
    let missing: Vec<PathBuf> = expected_inputs(&config)
        .into_iter()
        .filter(|path| !path.is_file())
        .collect();
    if !missing.is_empty() {
        for path in &missing {
            warn!("Missing input: {}", path.display());
        }
        return Err(anyhow!(
            "{} input file(s) missing under {}",
            missing.len(),
            data_dir.display()
        ));
    }
    load_study(&config).with_context(|| format!("failed to load study from {}", data_dir.display()))
}

fn handle_render(args: RenderArgs) -> Result<()> {
    let t_load = Instant::now();
    let study = load_checked(&args.data_dir)?;
    if args.profile || args.verbose {
        info!(
            "Load stage: {:.1} ms ({} subjects)",
            t_load.elapsed().as_secs_f64() * 1000.0,
            study.glucose.len()
        );
    }

    let subject = SubjectId(args.subject);
    let series = study.glucose_series(subject)?;

    let t_layout = Instant::now();
    let chart = build_polar_chart(series, &ChartLayout::default());
    if args.profile || args.verbose {
        info!(
            "Layout stage: {:.1} ms",
            t_layout.elapsed().as_secs_f64() * 1000.0
        );
    }
    info!(
        "Chart laid out: subject {}, {} points plotted, {} dropped",
        subject, chart.plotted_points, chart.dropped_points
    );

    if let Some(path) = args.scene_json.as_ref() {
        write_scene_json(&chart, path)?;
        info!("Wrote chart geometry: {}", path.display());
    }

    if let Some(path) = args.breakfast_csv.as_ref() {
        if path.as_os_str() == "-" {
            write_breakfast_stdout(&study)?;
        } else {
            write_breakfast_csv(&study, path)?;
            info!("Wrote breakfast flags: {}", path.display());
        }
    }

    let t_plot = Instant::now();
    render_chart_guard(&chart, &args.output, ChartKind::Svg)
        .map_err(|err| anyhow!("failed to render {}: {}", args.output.display(), err))?;
    info!("Wrote chart: {}", args.output.display());

    if let Some(path) = args.png.as_ref() {
        if let Err(err) = render_chart_guard(&chart, path, ChartKind::Png) {
            warn!("Skipping PNG render ({}): {}", path.display(), err);
        } else {
            info!("Wrote chart: {}", path.display());
        }
    }
    if args.profile || args.verbose {
        info!(
            "Plot stage: {:.1} ms",
            t_plot.elapsed().as_secs_f64() * 1000.0
        );
    }

    Ok(())
}

fn handle_summary(args: SummaryArgs) -> Result<()> {
    let study = load_checked(&args.data_dir)?;
    let report = summary_report(&args.data_dir, &study);

    if args.output.as_os_str() == "-" {
        io::stdout().lock().write_all(report.as_bytes())?;
    } else {
        fs::write(&args.output, report)
            .with_context(|| format!("failed to write {}", args.output.display()))?;
        info!("Study summary written: {}", args.output.display());
    }
    Ok(())
}

fn summary_report(data_dir: &Path, study: &Study) -> String {
    let mut report = String::new();

    report.push_str(&format!("DATA: {}\n", data_dir.display()));
    report.push_str(&format!("  demographics_rows: {}\n", study.demographics.len()));
    report.push_str(&format!(
        "  subjects: {} of {}\n\n",
        study.glucose.len(),
        SUBJECT_ID_RANGE.count()
    ));

    for (subject, series) in &study.glucose {
        report.push_str(&format!("SUBJECT: {}\n", subject));
        report.push_str(&format!("  glucose_readings: {}\n", series.len()));
        report.push_str(&format!(
            "  invalid_timestamps: {}\n",
            count_invalid_timestamps(series)
        ));
        if let Some((lo, hi)) = finite_extent(series.iter().map(|r| r.glucose_mg_dl)) {
            report.push_str(&format!("  glucose_mg_dl: {:.0}..{:.0}\n", lo, hi));
        }
        let first = series.iter().filter_map(|r| r.timestamp).min();
        let last = series.iter().filter_map(|r| r.timestamp).max();
        if let (Some(first), Some(last)) = (first, last) {
            report.push_str(&format!("  span: {} .. {}\n", first, last));
        }

        if let Ok(entries) = study.food_log(*subject) {
            let days = breakfast_days(entries);
            let with_breakfast = days.iter().filter(|d| d.has_standard_breakfast).count();
            report.push_str(&format!("  food_log_entries: {}\n", entries.len()));
            report.push_str(&format!(
                "  missing_begin_times: {}\n",
                count_missing_begin_times(entries)
            ));
            report.push_str(&format!(
                "  days: {} (standard breakfast on {})\n",
                days.len(),
                with_breakfast
            ));
        }
        report.push('\n');
    }
    report
}

fn write_scene_json(chart: &PolarChart, path: &Path) -> Result<()> {
    let text = serde_json::to_string_pretty(chart)?;
    fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn write_breakfast_stdout(study: &Study) -> Result<()> {
    let stdout = io::stdout();
    let handle = stdout.lock();
    let mut writer = csv::Writer::from_writer(handle);
    write_breakfast_rows(study, &mut writer)
}

fn write_breakfast_csv(study: &Study, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);
    write_breakfast_rows(study, &mut writer)
}

#[derive(Serialize)]
struct BreakfastRow<'a> {
    subject: String,
    day: &'a str,
    entries: usize,
    has_standard_breakfast: bool,
}

fn write_breakfast_rows<W: Write>(study: &Study, writer: &mut csv::Writer<W>) -> Result<()> {
    for (subject, entries) in &study.food_logs {
        for day in breakfast_days(entries) {
            writer.serialize(BreakfastRow {
                subject: subject.to_string(),
                day: &day.day,
                entries: day.entries,
                has_standard_breakfast: day.has_standard_breakfast,
            })?;
        }
    }
    writer.flush()?;
    Ok(())
}

enum ChartKind {
    Png,
    Svg,
}

fn render_chart_guard(chart: &PolarChart, path: &Path, kind: ChartKind) -> Result<(), String> {
    let render = || -> Result<(), String> {
        render_chart(chart, path, kind).map_err(|e| format!("plotting error: {}", e))
    };

    panic::catch_unwind(panic::AssertUnwindSafe(render))
        .map_err(|_| "plotting backend panicked".to_string())?
}

fn render_chart(chart: &PolarChart, path: &Path, kind: ChartKind) -> Result<()> {
    let size = (chart.width, chart.height);
    match kind {
        ChartKind::Png => {
            let root = BitMapBackend::new(path, size).into_drawing_area();
            draw_polar_chart(root, chart)?;
        }
        ChartKind::Svg => {
            let root = SVGBackend::new(path, size).into_drawing_area();
            draw_polar_chart(root, chart)?;
        }
    }
    Ok(())
}

fn draw_polar_chart<DB>(
    root: DrawingArea<DB, plotters::coord::Shift>,
    chart: &PolarChart,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;

    // Scene coordinates are centered on the dial; the backend origin is top-left.
    let center = (chart.width as f64 / 2.0, chart.height as f64 / 2.0);
    let to_canvas = move |(x, y): (f64, f64)| -> (i32, i32) {
        ((center.0 + x).round() as i32, (center.1 + y).round() as i32)
    };
    let origin = to_canvas((0.0, 0.0));

    let label_font = FontDesc::new(FontFamily::SansSerif, 12.0, FontStyle::Normal);
    let caption_font = FontDesc::new(FontFamily::SansSerif, 14.0, FontStyle::Normal);

    for circle in &chart.grid {
        root.draw(&Circle::new(
            origin,
            circle.radius.max(0.0).round() as u32,
            GRID_COLOR.stroke_width(1),
        ))?;
    }

    for spoke in &chart.spokes {
        root.draw(&PathElement::new(
            vec![origin, to_canvas((spoke.x, spoke.y))],
            SPOKE_COLOR.stroke_width(1),
        ))?;
    }

    let trace: Vec<(i32, i32)> = chart
        .curve_polyline(CURVE_STEPS_PER_SEGMENT)
        .into_iter()
        .map(to_canvas)
        .collect();
    if trace.len() >= 2 {
        let style = ShapeStyle {
            color: TRACE_COLOR.to_rgba(),
            filled: false,
            stroke_width: 2,
        };
        root.draw(&PathElement::new(trace, style))?;
    }

    for circle in &chart.grid {
        let style = label_font
            .clone()
            .color(&BLACK.mix(0.75))
            .pos(Pos::new(HPos::Right, VPos::Center));
        root.draw(&Text::new(
            circle.label.clone(),
            to_canvas((circle.label_x, circle.label_y)),
            style,
        ))?;
    }

    for label in &chart.hour_labels {
        let style = label_font
            .clone()
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Center));
        root.draw(&Text::new(
            label.text.clone(),
            to_canvas((label.x, label.y)),
            style,
        ))?;
    }

    for caption in &chart.captions {
        let mut style = caption_font
            .clone()
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Center));
        if caption.rotation_deg == 90.0 {
            style = style.transform(FontTransform::Rotate90);
        }
        root.draw(&Text::new(
            caption.text.clone(),
            to_canvas((caption.x, caption.y)),
            style,
        ))?;
    }

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glucose_radial::csv_table::CsvRow;
    use glucose_radial::wall_clock::parse_wall_clock;
    use glucose_radial::glucose::{GLUCOSE_COLUMN, TIMESTAMP_COLUMN};
    use glucose_radial::{GlucoseReading, FOOD_LOG_COLUMNS};

    fn write_study(dir: &Path) {
        let config = StudyConfig::with_data_dir(dir);
        fs::create_dir_all(dir.join("dexcom")).unwrap();
        fs::create_dir_all(dir.join("food_log")).unwrap();
        fs::write(config.demographics_path(), "ID,Gender\n1,FEMALE\n").unwrap();

        for subject in config.subjects() {
            let mut dexcom = format!("Index,{TIMESTAMP_COLUMN},Event Type,{GLUCOSE_COLUMN}\n");
            for idx in 1..=12 {
                dexcom.push_str(&format!("{idx},,Device,\n"));
            }
            dexcom.push_str("13,2020-02-13T00:00:00,EGV,90\n");
            dexcom.push_str("14,2020-02-13T08:00:00,EGV,160\n");
            dexcom.push_str("15,2020-02-13T16:00:00,EGV,120\n");
            dexcom.push_str("16,garbled,EGV,105\n");
            fs::write(config.dexcom_path(subject), dexcom).unwrap();

            let mut food = FOOD_LOG_COLUMNS.join(",");
            food.push('\n');
            food.push_str("2/13/2020,,2020-02-13 07:30:00,,Std Breakfast,1,bowl,,200,30,2,8,6,4\n");
            food.push_str("2/13/2020,,2020-02-13 12:00:00,,salad,1,bowl,,150,10,4,2,3,9\n");
            food.push_str("2/14/2020,,2020-02-14 07:45:00,,oatmeal,1,bowl,,180,32,4,1,5,3\n");
            fs::write(config.food_log_path(subject), food).unwrap();
        }
    }

    fn sample_chart() -> PolarChart {
        let series: Vec<GlucoseReading> = [
            ("2020-02-13 00:00:00", 80.0),
            ("2020-02-13 06:00:00", 150.0),
            ("2020-02-13 12:00:00", 120.0),
            ("2020-02-13 18:00:00", 95.0),
        ]
        .iter()
        .map(|(ts, value)| GlucoseReading {
            timestamp: parse_wall_clock(ts),
            glucose_mg_dl: *value,
            extra: CsvRow::default(),
        })
        .collect();
        build_polar_chart(&series, &ChartLayout::default())
    }

    #[test]
    fn svg_render_writes_a_drawing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.svg");
        render_chart_guard(&sample_chart(), &path, ChartKind::Svg).unwrap();
        let svg = fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Time of Day"));
        assert!(svg.contains("12:00"));
    }

    #[test]
    fn breakfast_rows_cover_every_day() {
        let mut study = Study::default();
        let mut values: [String; 14] = Default::default();
        values[2] = "2020-02-13 07:30:00".to_string();
        values[4] = "std bfast".to_string();
        let entry = glucose_radial::FoodLogEntry::from_values(values);
        study.food_logs.insert(SubjectId(2), vec![entry]);

        let mut writer = csv::Writer::from_writer(Vec::new());
        write_breakfast_rows(&study, &mut writer).unwrap();
        let bytes = writer.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text,
            "subject,day,entries,has_standard_breakfast\n002,2020-02-13,1,true\n"
        );
    }

    #[test]
    fn missing_inputs_are_counted_before_loading() {
        let dir = tempfile::tempdir().unwrap();
        write_study(dir.path());
        fs::remove_file(dir.path().join("food_log").join("Food_Log_014.csv")).unwrap();

        let err = load_checked(dir.path()).unwrap_err();
        assert!(
            err.to_string().starts_with("1 input file(s) missing under"),
            "{err}"
        );
    }

    #[test]
    fn summary_reports_each_subject() {
        let dir = tempfile::tempdir().unwrap();
        write_study(dir.path());
        let output = dir.path().join("summary.txt");

        handle_summary(SummaryArgs {
            data_dir: dir.path().to_path_buf(),
            output: output.clone(),
            verbose: false,
        })
        .unwrap();

        let report = fs::read_to_string(&output).unwrap();
        assert!(report.contains("  subjects: 11 of 16\n"));
        assert_eq!(report.matches("SUBJECT: ").count(), 11);
        assert!(!report.contains("SUBJECT: 003"));

        let block = report.split("SUBJECT: 001\n").nth(1).unwrap();
        let block = block.split("\n\n").next().unwrap();
        assert!(block.contains("  glucose_readings: 4\n"));
        assert!(block.contains("  invalid_timestamps: 1\n"));
        assert!(block.contains("  glucose_mg_dl: 90..160\n"));
        assert!(block.contains("  food_log_entries: 3\n"));
        assert!(block.contains("  missing_begin_times: 0\n"));
        assert!(block.contains("  days: 2 (standard breakfast on 1)"));
    }

    #[test]
    fn scene_json_reads_back_as_a_chart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.json");
        let chart = sample_chart();
        write_scene_json(&chart, &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let parsed: PolarChart = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.width, chart.width);
        assert_eq!(parsed.plotted_points, 4);
        assert_eq!(parsed.curve.len(), chart.curve.len());
        let labels: Vec<&str> = parsed.grid.iter().map(|g| g.label.as_str()).collect();
        let expected: Vec<&str> = chart.grid.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, expected);
        assert_eq!(parsed.captions[1].text, "Time of Day");
    }
}
