//! Energy signature plot: daily usage per day against daily mean temperature,
//! overlaid with the selected model curve and its candidates. Rendered as SVG.

use plotters::prelude::*;

use super::daily::{daily_temperature_means, UsagePerDayCandidate, UsagePerDayModelResults};
use super::series::{Aggregation, Frequency, TimeSeries};
use crate::error::{Error, Result};

const SIZE: (u32, u32) = (1000, 400);
/// Temperature axis range in °F.
pub const TEMP_RANGE: (f64, f64) = (-5.0, 88.0);
const CANDIDATE_ALPHA: f64 = 0.02;

fn plot_error(e: impl std::fmt::Display) -> Error {
    Error::Plot(e.to_string())
}

/// Renders the energy signature of `meter_data` with the fitted model.
///
/// Fails when the model has no selected candidate or there are no days with
/// both usage and temperature.
pub fn plot_energy_signature(
    meter_data: &TimeSeries,
    temperature_data: &TimeSeries,
    model: &UsagePerDayModelResults,
) -> Result<String> {
    let selected = model
        .model
        .as_ref()
        .ok_or_else(|| Error::Plot("model has no selected candidate".to_string()))?;

    let temps = daily_temperature_means(temperature_data);
    let points: Vec<(f64, f64)> = meter_data
        .resample(Frequency::Daily, Aggregation::Sum)
        .iter()
        .filter_map(|p| Some((*temps.get(&p.timestamp)?, p.value?)))
        .collect();
    if points.is_empty() {
        return Err(Error::Plot("no days with usage and temperature".to_string()));
    }

    let y_max = points
        .iter()
        .map(|(_, u)| *u)
        .fold(0.0_f64, f64::max)
        .max(f64::EPSILON)
        * 1.1;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(plot_error)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&selected.formula, ("sans-serif", 16))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(TEMP_RANGE.0..TEMP_RANGE.1, 0.0..y_max)
            .map_err(plot_error)?;
        chart
            .configure_mesh()
            .x_desc("Temperature (°F)")
            .y_desc("Usage per day")
            .draw()
            .map_err(plot_error)?;

        chart
            .draw_series(
                points
                    .iter()
                    .map(|(t, u)| Circle::new((*t, *u), 2, BLUE.mix(0.5).filled())),
            )
            .map_err(plot_error)?;

        for candidate in &model.candidates {
            if let Some(line) = curve(candidate) {
                chart
                    .draw_series(LineSeries::new(line, BLACK.mix(CANDIDATE_ALPHA)))
                    .map_err(plot_error)?;
            }
        }
        if let Some(line) = curve(selected) {
            chart
                .draw_series(LineSeries::new(line, RED.stroke_width(2)))
                .map_err(plot_error)?;
        }

        root.present().map_err(plot_error)?;
    }
    Ok(svg)
}

/// Model curve over the temperature axis, one point per degree.
fn curve(candidate: &UsagePerDayCandidate) -> Option<Vec<(f64, f64)>> {
    let (lo, hi) = TEMP_RANGE;
    (0..=(hi - lo) as usize)
        .map(|i| {
            let t = lo + i as f64;
            let usage = candidate.predict_day(t)?.total();
            usage.is_finite().then_some((t, usage))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caltrack::daily::{
        create_caltrack_daily_design_matrix, fit_caltrack_usage_per_day_model, DailyFitSettings,
    };
    use crate::caltrack::model::ModelStatus;
    use chrono::{Duration, TimeZone, Utc};

    fn data() -> (TimeSeries, TimeSeries) {
        let start = Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap();
        let temp = |d: i64| 50.0 + 30.0 * (d as f64 / 365.0 * std::f64::consts::TAU).cos();
        let temps =
            TimeSeries::from_points((0..365 * 24).map(|h| (start + Duration::hours(h), Some(temp(h / 24)))));
        let meter = TimeSeries::from_points((0..365).map(|d| {
            let noise = ((d * 3) % 7) as f64 * 0.2;
            (start + Duration::days(d), Some(10.0 + 0.8 * (60.0 - temp(d)).max(0.0) + noise))
        }));
        (meter, temps)
    }

    #[test]
    fn test_plot_renders_points_and_model() {
        let (meter, temps) = data();
        let dm = create_caltrack_daily_design_matrix(&meter, &temps);
        let model = fit_caltrack_usage_per_day_model(&dm, &DailyFitSettings::default());
        assert_eq!(model.status, ModelStatus::Success);

        let svg = plot_energy_signature(&meter, &temps, &model).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert!(svg.matches("<circle").count() >= 365);
        assert!(svg.contains("<polyline"));
    }

    #[test]
    fn test_plot_fails_without_selected_model() {
        let (meter, temps) = data();
        let dm = create_caltrack_daily_design_matrix(&meter, &temps);
        let mut model = fit_caltrack_usage_per_day_model(&dm, &DailyFitSettings::default());
        model.model = None;

        let result = plot_energy_signature(&meter, &temps, &model);
        assert!(matches!(result, Err(Error::Plot(_))));
    }
}
