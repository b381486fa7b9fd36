// Terminal rendition of the word cloud: pixel layout projected onto cells

use anchorscope_core::aggregate::AnchorRecord;
use anchorscope_core::layout::{
    ColorBucket, LayoutConfig, TextMeasurer, TextSize, WordCloudLayoutEngine,
};
use anchorscope_core::table::AnchorFilter;

/// Pixels per terminal column and row.
pub const CELL_WIDTH: f64 = 8.0;
pub const CELL_HEIGHT: f64 = 16.0;

/// Every glyph is one cell; font size only changes emphasis.
#[derive(Debug, Clone, Copy, Default)]
pub struct CellMeasurer;

impl TextMeasurer for CellMeasurer {
    fn measure(&self, text: &str, _font_px: f64) -> Option<TextSize> {
        let chars = text.chars().count();
        (chars > 0).then(|| TextSize {
            width: chars as f64 * CELL_WIDTH,
            height: CELL_HEIGHT,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloudWord {
    pub text: String,
    pub count: usize,
    pub col: u16,
    pub row: u16,
    pub color: ColorBucket,
    pub font_size_px: f64,
}

impl CloudWord {
    pub fn emphasized(&self) -> bool {
        matches!(self.color, ColorBucket::Highest | ColorBucket::High)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CloudCells {
    pub words: Vec<CloudWord>,
    /// Rows actually used, top margin included.
    pub rows: u16,
    pub dropped: usize,
}

fn engine_for(rows: u16) -> WordCloudLayoutEngine<CellMeasurer> {
    let canvas = rows as f64 * CELL_HEIGHT;
    let defaults = LayoutConfig::default();
    let config = LayoutConfig {
        min_height: defaults.min_height.min(canvas),
        max_height: canvas,
        final_padding: 0.0,
        min_padding: 1.0,
        ..defaults
    };
    WordCloudLayoutEngine::new(config, CellMeasurer)
}

/// Lay out the records inside a `cols` x `rows` character area.
pub fn layout_cells(records: &[AnchorRecord], filter: &AnchorFilter, cols: u16, rows: u16) -> CloudCells {
    if cols == 0 || rows == 0 {
        return CloudCells::default();
    }

    let engine = engine_for(rows);
    let layout = engine.layout(records, filter, cols as f64 * CELL_WIDTH);

    let words = layout
        .items
        .iter()
        .map(|item| CloudWord {
            text: item.record.text.clone(),
            count: item.record.count,
            col: (item.x / CELL_WIDTH).floor() as u16,
            row: (item.y / CELL_HEIGHT).floor() as u16,
            color: item.color,
            font_size_px: item.font_size_px,
        })
        .filter(|word| word.row < rows)
        .collect();

    CloudCells {
        words,
        rows: (layout.height / CELL_HEIGHT).ceil() as u16,
        dropped: layout.dropped.len(),
    }
}
