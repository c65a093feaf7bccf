use std::f64::consts::PI;
use std::fs;
use std::path::Path;

use glucose_radial::glucose::{GLUCOSE_COLUMN, INDEX_COLUMN, TIMESTAMP_COLUMN};
use glucose_radial::polar::{build_polar_chart, ChartLayout, PathCommand};
use glucose_radial::{
    breakfast_days, load_study, GlucoseError, StudyConfig, SubjectId, DEFAULT_SUBJECT,
};

const DEXCOM_HEADER: &str = "Index,Timestamp (YYYY-MM-DDThh:mm:ss),Event Type,Event Subtype,Patient Info,Device Info,Source Device ID,Glucose Value (mg/dL),Insulin Value (u/h),Carb Value (grams),Duration (hh:mm:ss),Glucose Rate of Change (mg/dL/min),Transmitter Time (Long Integer)";

const FOOD_HEADER: &str = "date,time,time_begin,time_end,logged_food,amount,unit,searched_food,calorie,total_carb,dietary_fiber,sugar,protein,total_fat";

fn dexcom_csv(readings: &[(&str, &str)]) -> String {
    let mut out = String::from(DEXCOM_HEADER);
    out.push('\n');
    let preamble = [
        "FirstName", "LastName", "DateOfBirth", "Device", "Device", "Alert", "Alert", "Alert",
        "Alert", "Alert", "Alert", "Alert",
    ];
    for (idx, kind) in preamble.iter().enumerate() {
        out.push_str(&format!("{},,{},,,,,,,,,,\n", idx + 1, kind));
    }
    for (offset, (ts, value)) in readings.iter().enumerate() {
        out.push_str(&format!(
            "{},{},EGV,,,,Android G6,{},,,,,{}\n",
            offset + 13,
            ts,
            value,
            1000 + offset
        ));
    }
    out
}

fn food_row(begin: &str, food: &str) -> String {
    format!("2/13/2020,,{begin},,{food},1,serving,,250,30,2,8,6,9\n")
}

fn write_study(dir: &Path) {
    fs::create_dir_all(dir.join("dexcom")).unwrap();
    fs::create_dir_all(dir.join("food_log")).unwrap();
    fs::write(
        dir.join("Demographics.csv"),
        "ID,Gender,HbA1c\n1,FEMALE,5.5\n2,MALE,6.1\n",
    )
    .unwrap();

    for id in 1..=16u16 {
        let subject = SubjectId(id);
        let dexcom = if id == 1 {
            dexcom_csv(&[
                ("2020-02-13 00:00:00", "70"),
                ("2020-02-13 06:00:00", "180"),
                ("2020-02-13 12:00:00", "125"),
                ("2020-02-13 18:00:00", "100"),
                ("not-a-date", "110"),
            ])
        } else {
            dexcom_csv(&[
                ("2020-02-13T07:00:00", "95"),
                ("2020-02-13T07:05:00", "101"),
                ("2020-02-13T07:10:00", "104"),
            ])
        };
        fs::write(dir.join("dexcom").join(format!("Dexcom_{subject}.csv")), dexcom).unwrap();

        let mut food = String::from(FOOD_HEADER);
        food.push('\n');
        food.push_str(&food_row("2020-02-13 07:10:00", "coffee"));
        food.push_str(&food_row("2020-02-13 07:30:00", "Std Breakfast"));
        food.push_str(&food_row("2020-02-14 07:30:00", "oatmeal"));
        food.push_str(&food_row("sometime", "FROSTED FLAKES"));
        food.push_str(&food_row("", "banana"));
        fs::write(dir.join("food_log").join(format!("Food_Log_{subject}.csv")), food).unwrap();
    }
}

#[test]
fn loads_every_included_subject() {
    let temp = tempfile::tempdir().unwrap();
    write_study(temp.path());
    let study = load_study(&StudyConfig::with_data_dir(temp.path())).unwrap();

    assert_eq!(study.demographics.len(), 2);
    let ids: Vec<u16> = study.glucose.keys().map(|s| s.0).collect();
    assert_eq!(ids, vec![1, 2, 4, 5, 6, 8, 9, 10, 11, 12, 14]);
    assert_eq!(study.food_logs.len(), 11);

    for series in study.glucose.values() {
        assert!(!series.is_empty());
        assert!(series.iter().all(|r| !(r.glucose_mg_dl < 0.0)));
    }
}

#[test]
fn glucose_series_drops_preamble_and_index() {
    let temp = tempfile::tempdir().unwrap();
    write_study(temp.path());
    let study = load_study(&StudyConfig::with_data_dir(temp.path())).unwrap();

    let series = study.glucose_series(DEFAULT_SUBJECT).unwrap();
    // 12 preamble rows + 5 readings in the file.
    assert_eq!(series.len(), 17 - 12);
    for reading in series {
        assert!(!reading.extra.contains(INDEX_COLUMN));
        assert!(!reading.extra.contains(TIMESTAMP_COLUMN));
        assert!(!reading.extra.contains(GLUCOSE_COLUMN));
        assert_eq!(reading.extra.get("Source Device ID"), Some("Android G6"));
    }
    assert!(series[4].timestamp.is_none());
    assert_eq!(series[4].glucose_mg_dl, 110.0);
}

#[test]
fn food_logs_carry_breakfast_flags() {
    let temp = tempfile::tempdir().unwrap();
    write_study(temp.path());
    let study = load_study(&StudyConfig::with_data_dir(temp.path())).unwrap();

    let log = study.food_log(SubjectId(2)).unwrap();
    assert_eq!(log.len(), 5);
    assert_eq!(log[0].logged_food, "coffee");
    assert_eq!(log[0].has_standard_breakfast, Some(true));
    assert_eq!(log[1].has_standard_breakfast, Some(true));
    assert_eq!(log[2].has_standard_breakfast, Some(false));
    // Both unparseable begin times share one bucket that holds frosted flakes.
    assert!(log[3].time_begin.is_none() && log[4].time_begin.is_none());
    assert_eq!(log[3].has_standard_breakfast, Some(true));
    assert_eq!(log[4].has_standard_breakfast, Some(true));

    let days = breakfast_days(log);
    let labels: Vec<&str> = days.iter().map(|d| d.day.as_str()).collect();
    assert_eq!(labels, vec!["2020-02-13", "2020-02-14", "Invalid Date"]);
}

#[test]
fn excluded_subjects_are_not_loaded() {
    let temp = tempfile::tempdir().unwrap();
    write_study(temp.path());
    fs::remove_file(temp.path().join("dexcom").join("Dexcom_003.csv")).unwrap();
    let study = load_study(&StudyConfig::with_data_dir(temp.path())).unwrap();
    assert!(matches!(
        study.glucose_series(SubjectId(3)),
        Err(GlucoseError::UnknownSubject(SubjectId(3)))
    ));
}

#[test]
fn missing_subject_file_aborts_the_load() {
    let temp = tempfile::tempdir().unwrap();
    write_study(temp.path());
    fs::remove_file(temp.path().join("food_log").join("Food_Log_009.csv")).unwrap();
    let err = load_study(&StudyConfig::with_data_dir(temp.path())).unwrap_err();
    match err {
        GlucoseError::Io { path, .. } => assert!(path.ends_with("Food_Log_009.csv")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn schema_drift_is_reported() {
    let temp = tempfile::tempdir().unwrap();
    write_study(temp.path());
    fs::write(
        temp.path().join("food_log").join("Food_Log_004.csv"),
        "date,time_begin,logged_food\n2/13/2020,2020-02-13 07:00:00,toast\n",
    )
    .unwrap();
    let err = load_study(&StudyConfig::with_data_dir(temp.path())).unwrap_err();
    assert!(matches!(
        err,
        GlucoseError::SchemaDrift {
            expected: 14,
            found: 3,
            ..
        }
    ));
}

#[test]
fn subject_one_maps_onto_the_dial() {
    let temp = tempfile::tempdir().unwrap();
    write_study(temp.path());
    let study = load_study(&StudyConfig::with_data_dir(temp.path())).unwrap();
    let series = study.glucose_series(DEFAULT_SUBJECT).unwrap();

    let layout = ChartLayout::default();
    let angle = layout.angle_scale();
    assert_eq!(angle.apply(series[0].hour_of_day()), 0.0);
    assert!((angle.apply(series[2].hour_of_day()) - PI).abs() < 1e-12);

    let chart = build_polar_chart(series, &layout);
    assert_eq!(chart.glucose_extent, Some((70.0, 180.0)));
    assert_eq!(chart.plotted_points, 4);
    assert_eq!(chart.dropped_points, 1);
    assert!(matches!(chart.curve.first(), Some(PathCommand::MoveTo { .. })));
    assert_eq!(chart.grid.len(), 6);
}
