//! ASCII occupancy map for quick terminal review.
//!
//! One character per cell, highest row first so `+y` points up.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use grid_core::movement::MovementState;
use grid_core::occupant::OccupantId;
use grid_core::position::GridPosition;
use grid_core::simulation::Simulation;

/// ASCII visualization configuration.
#[derive(Debug, Clone)]
pub struct AsciiConfig {
    /// Show the symbol legend and counts.
    pub show_legend: bool,
    /// Use colored output (ANSI).
    pub use_color: bool,
}

impl Default for AsciiConfig {
    fn default() -> Self {
        Self {
            show_legend: true,
            use_color: true,
        }
    }
}

/// ANSI color codes.
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";

    pub const CYAN: &str = "\x1b[36m";
    pub const RED: &str = "\x1b[31m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const GREEN: &str = "\x1b[32m";
    pub const MAGENTA: &str = "\x1b[35m";
}

/// What a cell shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Glyph {
    Free,
    Building,
    Unit(MovementState),
    Unknown,
}

impl Glyph {
    const fn symbol(self) -> char {
        match self {
            Self::Free => '.',
            Self::Building => '#',
            Self::Unit(MovementState::Idle) => 'o',
            Self::Unit(MovementState::Moving) => '>',
            Self::Unit(MovementState::WaitingForNextCell) => 'w',
            Self::Unit(MovementState::Blocked) => 'x',
            Self::Unknown => '?',
        }
    }

    const fn color(self) -> &'static str {
        match self {
            Self::Free => colors::DIM,
            Self::Building => colors::BOLD,
            Self::Unit(MovementState::Idle) => colors::GREEN,
            Self::Unit(MovementState::Moving) => colors::CYAN,
            Self::Unit(MovementState::WaitingForNextCell) => colors::YELLOW,
            Self::Unit(MovementState::Blocked) => colors::RED,
            Self::Unknown => colors::MAGENTA,
        }
    }
}

/// Render the grid's occupancy as ASCII art.
///
/// A moving unit is drawn on the cell it has reserved, which is the cell
/// the grid holds for it.
#[must_use]
pub fn render_occupancy(sim: &Simulation, config: &AsciiConfig) -> String {
    let grid = sim.grid();
    let width = grid.width() as usize;

    let mut glyphs: BTreeMap<OccupantId, Glyph> = sim
        .units()
        .map(|unit| (unit.id, Glyph::Unit(unit.locomotion.state())))
        .collect();
    glyphs.extend(sim.buildings().map(|building| (building.id, Glyph::Building)));

    let mut counts: BTreeMap<char, usize> = BTreeMap::new();
    let mut output = String::new();

    let _ = writeln!(
        output,
        "{}╔══ Tick: {} │ Units: {} │ Buildings: {} ══╗{}",
        if config.use_color { colors::BOLD } else { "" },
        sim.current_tick(),
        sim.units().count(),
        sim.buildings().count(),
        if config.use_color { colors::RESET } else { "" }
    );

    output.push('║');
    output.push_str(&"═".repeat(width));
    output.push_str("║\n");

    for y in (0..grid.height() as i32).rev() {
        output.push('║');
        for x in 0..width as i32 {
            let glyph = match grid.occupant_at(GridPosition::new(x, y)) {
                None => Glyph::Free,
                Some(id) => glyphs.get(&id).copied().unwrap_or(Glyph::Unknown),
            };
            *counts.entry(glyph.symbol()).or_default() += 1;
            if config.use_color {
                output.push_str(glyph.color());
                output.push(glyph.symbol());
                output.push_str(colors::RESET);
            } else {
                output.push(glyph.symbol());
            }
        }
        output.push_str("║\n");
    }

    if config.show_legend {
        output.push_str("╠══ LEGEND ");
        output.push_str(&"═".repeat(width.saturating_sub(10)));
        output.push_str("╣\n");
        output.push_str("║ .=free #=building o=idle >=moving w=waiting x=blocked ?=unknown\n");

        output.push_str("║ ");
        for (symbol, count) in &counts {
            let _ = write!(output, "{symbol}:{count} ");
        }
        output.push('\n');
    }

    output.push('╚');
    output.push_str(&"═".repeat(width));
    output.push_str("╝\n");

    output
}

#[cfg(test)]
mod tests {
    use grid_test_utils::fixtures::{building, buggy, pos, simulation};

    use super::*;

    fn plain() -> AsciiConfig {
        AsciiConfig {
            show_legend: false,
            use_color: false,
        }
    }

    fn map_rows(rendered: &str) -> Vec<String> {
        rendered
            .lines()
            .skip(2)
            .filter(|line| line.starts_with('║'))
            .map(|line| line.trim_matches('║').to_string())
            .collect()
    }

    #[test]
    fn test_render_empty_grid() {
        let sim = simulation(4, 2);
        let rows = map_rows(&render_occupancy(&sim, &plain()));
        assert_eq!(rows, vec!["....", "...."]);
    }

    #[test]
    fn test_render_units_and_buildings() {
        let mut sim = simulation(5, 3);
        sim.place_building(&building(2, 2, (2, 0)), pos(0, 0)).unwrap();
        sim.spawn_unit(&buggy(), pos(4, 2)).unwrap();

        let rows = map_rows(&render_occupancy(&sim, &plain()));
        assert_eq!(rows, vec!["....o", "##...", "##..."]);
    }

    #[test]
    fn test_moving_unit_drawn_on_reserved_cell() {
        let mut sim = simulation(4, 1);
        let unit = sim.spawn_unit(&buggy(), pos(0, 0)).unwrap();
        sim.move_unit(unit, pos(3, 0)).unwrap();
        sim.tick();
        sim.tick();

        let rows = map_rows(&render_occupancy(&sim, &plain()));
        assert_eq!(rows, vec![".>.."]);
    }

    #[test]
    fn test_legend_and_color() {
        let sim = simulation(12, 1);
        let rendered = render_occupancy(&sim, &AsciiConfig::default());
        assert!(rendered.contains("LEGEND"));
        assert!(rendered.contains(".:12"));
        assert!(rendered.contains(colors::RESET));
    }
}
