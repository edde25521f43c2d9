//! Text views derived from [`AppState`].

use std::fmt::Write as _;

use crate::{
    NutritionResult,
    app_state::{AppState, Phase},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacroShare {
    pub label: &'static str,
    pub grams: f64,
    pub percent: f64,
}

/// Proportions of protein, carbs and fat by weight.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroBreakdown {
    pub shares: [MacroShare; 3],
}

impl MacroBreakdown {
    /// `None` when there is nothing to chart.
    pub fn from_result(result: &NutritionResult) -> Option<Self> {
        let total = result.protein + result.carbs + result.fat;
        if total <= 0.0 {
            return None;
        }
        let share = |label, grams: f64| MacroShare {
            label,
            grams,
            percent: grams / total * 100.0,
        };
        Some(Self {
            shares: [
                share("Protein", result.protein),
                share("Carbs", result.carbs),
                share("Fat", result.fat),
            ],
        })
    }
}

pub fn render(state: &AppState) -> String {
    match state.phase() {
        Phase::Idle => render_intro(),
        Phase::Analyzing => "Analyzing Meal...\n".to_string(),
        Phase::Error => render_error(state.error_message().unwrap_or_default()),
        Phase::Success => match state.result() {
            Some(result) if !result.is_food_detected => render_not_food(),
            Some(result) => render_result(result),
            None => render_intro(),
        },
    }
}

fn render_intro() -> String {
    "Know what you eat, instantly.\n\
     Snap a photo of your meal and let AI break down the macros, calories, and nutrients for you.\n"
        .to_string()
}

fn render_error(message: &str) -> String {
    format!("Error: {message}\nRun again to retry.\n")
}

fn render_not_food() -> String {
    "Not Food Detected\n\
     We couldn't identify any food in this image. Please try uploading a clear photo of a meal.\n"
        .to_string()
}

pub fn render_result(result: &NutritionResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", result.subject_label);
    if !result.summary.is_empty() {
        let _ = writeln!(out, "{}", result.summary);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Nutritional Breakdown: {} kcal", format_amount(result.calories));
    let _ = writeln!(
        out,
        "  Protein {}g | Carbs {}g | Fat {}g",
        format_amount(result.protein),
        format_amount(result.carbs),
        format_amount(result.fat)
    );

    if let Some(breakdown) = MacroBreakdown::from_result(result) {
        for share in &breakdown.shares {
            let bar = "#".repeat((share.percent / 5.0).round() as usize);
            let _ = writeln!(out, "  {:<8}{:>5.1}% {}", share.label, share.percent, bar);
        }
    }
    out
}

fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}
