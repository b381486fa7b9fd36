// Word-cloud placement for aggregated anchor texts.
//
// Greedy: items are placed largest first on an Archimedean spiral around the
// canvas center, and an item that fits nowhere (even after one shrink) is
// dropped. The result is not globally optimal and is not meant to be.

use crate::aggregate::AnchorRecord;
use crate::table::AnchorFilter;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextSize {
    pub width: f64,
    pub height: f64,
}

/// Font metrics backend. `None` means the text cannot be measured and the
/// item is left out of the layout.
pub trait TextMeasurer {
    fn measure(&self, text: &str, font_px: f64) -> Option<TextSize>;
}

/// Estimates every glyph as a fixed fraction of the font size.
#[derive(Debug, Clone, Copy)]
pub struct FixedWidthMeasurer {
    pub char_width: f64,
    pub line_height: f64,
}

impl Default for FixedWidthMeasurer {
    fn default() -> Self {
        Self {
            char_width: 0.6,
            line_height: 1.2,
        }
    }
}

impl TextMeasurer for FixedWidthMeasurer {
    fn measure(&self, text: &str, font_px: f64) -> Option<TextSize> {
        let chars = text.chars().count();
        if chars == 0 || !font_px.is_finite() || font_px <= 0.0 {
            return None;
        }
        Some(TextSize {
            width: chars as f64 * font_px * self.char_width,
            height: font_px * self.line_height,
        })
    }
}

/// Floors for the spiral parameters; they bound the candidates tried per word.
const MIN_SPIRAL_SPACING: f64 = 0.1;
const MIN_SPIRAL_STEP: f64 = 0.01;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutConfig {
    pub min_height: f64,
    pub max_height: f64,
    pub base_height: f64,
    pub row_height: f64,
    /// Container width per estimated word when guessing the row count.
    pub word_width_estimate: f64,
    pub min_font_px: f64,
    pub max_font_px: f64,
    pub max_items: usize,
    /// Radius gained per radian of spiral.
    pub spiral_spacing: f64,
    /// Angle advanced between candidate centers, in radians.
    pub spiral_step: f64,
    pub retry_scale: f64,
    pub min_padding: f64,
    pub padding_ratio: f64,
    pub final_padding: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            min_height: 300.0,
            max_height: 800.0,
            base_height: 200.0,
            row_height: 60.0,
            word_width_estimate: 150.0,
            min_font_px: 12.0,
            max_font_px: 48.0,
            max_items: 100,
            spiral_spacing: 4.0,
            spiral_step: 0.1,
            retry_scale: 0.75,
            min_padding: 2.0,
            padding_ratio: 0.15,
            final_padding: 20.0,
        }
    }
}

/// Five discrete shades keyed on `count / max_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorBucket {
    Highest,
    High,
    Medium,
    Low,
    Lowest,
}

impl ColorBucket {
    pub fn for_ratio(ratio: f64) -> Self {
        if ratio >= 0.8 {
            ColorBucket::Highest
        } else if ratio >= 0.6 {
            ColorBucket::High
        } else if ratio >= 0.4 {
            ColorBucket::Medium
        } else if ratio >= 0.2 {
            ColorBucket::Low
        } else {
            ColorBucket::Lowest
        }
    }

    pub fn hex(&self) -> &'static str {
        match self {
            ColorBucket::Highest => "#1e40af",
            ColorBucket::High => "#2563eb",
            ColorBucket::Medium => "#3b82f6",
            ColorBucket::Low => "#60a5fa",
            ColorBucket::Lowest => "#93c5fd",
        }
    }

    pub fn rgb(&self) -> (u8, u8, u8) {
        match self {
            ColorBucket::Highest => (0x1e, 0x40, 0xaf),
            ColorBucket::High => (0x25, 0x63, 0xeb),
            ColorBucket::Medium => (0x3b, 0x82, 0xf6),
            ColorBucket::Low => (0x60, 0xa5, 0xfa),
            ColorBucket::Lowest => (0x93, 0xc5, 0xfd),
        }
    }
}

impl fmt::Display for ColorBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.hex())
    }
}

/// One placed anchor text. `x`/`y` are the top-left of the unpadded box.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutItem<'a> {
    pub record: &'a AnchorRecord,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub font_size_px: f64,
    pub color: ColorBucket,
    pub padding: f64,
}

impl LayoutItem<'_> {
    pub fn padded(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height).inflate(self.padding)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn inflate(&self, by: f64) -> Self {
        Self::new(
            self.x - by,
            self.y - by,
            self.width + 2.0 * by,
            self.height + 2.0 * by,
        )
    }

    /// Touching edges do not count as overlap.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WordCloudLayout<'a> {
    pub width: f64,
    pub height: f64,
    /// Placed items, largest first.
    pub items: Vec<LayoutItem<'a>>,
    /// Candidates that fit nowhere on the canvas.
    pub dropped: Vec<&'a AnchorRecord>,
}

impl WordCloudLayout<'_> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

pub struct WordCloudLayoutEngine<M: TextMeasurer = FixedWidthMeasurer> {
    config: LayoutConfig,
    measurer: M,
}

impl Default for WordCloudLayoutEngine<FixedWidthMeasurer> {
    fn default() -> Self {
        Self::new(LayoutConfig::default(), FixedWidthMeasurer::default())
    }
}

impl<M: TextMeasurer> WordCloudLayoutEngine<M> {
    pub fn new(config: LayoutConfig, measurer: M) -> Self {
        Self { config, measurer }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Filtered candidates, most frequent first (stable), capped at `max_items`.
    pub fn candidates<'a>(
        &self,
        records: &'a [AnchorRecord],
        filter: &AnchorFilter,
    ) -> Vec<&'a AnchorRecord> {
        let mut selected: Vec<&AnchorRecord> =
            records.iter().filter(|r| filter.matches(r)).collect();
        selected.sort_by(|a, b| b.count.cmp(&a.count));
        selected.truncate(self.config.max_items);
        selected
    }

    pub fn estimated_height(&self, candidate_count: usize, width: f64) -> f64 {
        let cfg = &self.config;
        let words_per_row = ((width / cfg.word_width_estimate).floor() as usize).max(1);
        let rows = candidate_count.div_ceil(words_per_row);
        (cfg.base_height + rows as f64 * cfg.row_height).clamp(cfg.min_height, cfg.max_height)
    }

    pub fn font_size(&self, count: usize, max_count: usize) -> f64 {
        let cfg = &self.config;
        if max_count <= 1 || count == 0 {
            return cfg.min_font_px;
        }
        let scale = (count as f64).ln() / (max_count as f64).ln();
        (cfg.min_font_px + (cfg.max_font_px - cfg.min_font_px) * scale)
            .clamp(cfg.min_font_px, cfg.max_font_px)
    }

    fn padding(&self, font_px: f64) -> f64 {
        (font_px * self.config.padding_ratio).max(self.config.min_padding)
    }

    pub fn layout<'a>(
        &self,
        records: &'a [AnchorRecord],
        filter: &AnchorFilter,
        width: f64,
    ) -> WordCloudLayout<'a> {
        let candidates = self.candidates(records, filter);
        let height = self.estimated_height(candidates.len(), width);

        let mut layout = WordCloudLayout {
            width,
            height,
            items: Vec::with_capacity(candidates.len()),
            dropped: Vec::new(),
        };

        if !width.is_finite() || width <= 0.0 {
            layout.dropped = candidates;
            return layout;
        }

        let max_count = candidates.first().map(|r| r.count).unwrap_or(0);

        for record in candidates {
            // Never larger than anything more frequent already placed.
            let cap = layout
                .items
                .iter()
                .filter(|item| item.record.count > record.count)
                .map(|item| item.font_size_px)
                .fold(f64::INFINITY, f64::min);
            let size = self.font_size(record.count, max_count).min(cap);
            let color = ColorBucket::for_ratio(record.count as f64 / max_count as f64);

            let attempts = [
                (size, self.padding(size)),
                (
                    size * self.config.retry_scale,
                    self.padding(size * self.config.retry_scale) / 2.0,
                ),
            ];

            let placed = attempts.iter().find_map(|&(font_px, padding)| {
                let text = self.measurer.measure(&record.text, font_px)?;
                let (x, y) = self.find_position(&layout.items, text, padding, width, height)?;
                Some(LayoutItem {
                    record,
                    x,
                    y,
                    width: text.width,
                    height: text.height,
                    font_size_px: font_px,
                    color,
                    padding,
                })
            });

            match placed {
                Some(item) => layout.items.push(item),
                None => layout.dropped.push(record),
            }
        }

        self.fit_height(&mut layout);
        layout
    }

    fn find_position(
        &self,
        placed: &[LayoutItem<'_>],
        text: TextSize,
        padding: f64,
        width: f64,
        height: f64,
    ) -> Option<(f64, f64)> {
        if text.width > width || text.height > height {
            return None;
        }

        let cx = width / 2.0;
        let cy = height / 2.0;
        let max_radius = width.hypot(height) / 2.0;
        let spacing = self.config.spiral_spacing.max(MIN_SPIRAL_SPACING);
        let step = self.config.spiral_step.max(MIN_SPIRAL_STEP);

        let mut theta: f64 = 0.0;
        loop {
            let radius = spacing * theta;
            if radius > max_radius {
                return None;
            }

            let x = cx + radius * theta.cos() - text.width / 2.0;
            let y = cy + radius * theta.sin() - text.height / 2.0;

            let in_bounds = x >= 0.0 && y >= 0.0 && x + text.width <= width && y + text.height <= height;
            if in_bounds {
                let candidate = Rect::new(x, y, text.width, text.height).inflate(padding);
                if !placed.iter().any(|item| item.padded().intersects(&candidate)) {
                    return Some((x, y));
                }
            }

            theta += step;
        }
    }

    /// Shrink the canvas to the placed content plus a fixed margin.
    fn fit_height(&self, layout: &mut WordCloudLayout<'_>) {
        let Some(top) = layout.items.iter().map(|i| i.y).reduce(f64::min) else {
            return;
        };
        let bottom = layout
            .items
            .iter()
            .map(|i| i.y + i.height)
            .fold(f64::NEG_INFINITY, f64::max);

        let margin = self.config.final_padding;
        let shift = margin - top;
        for item in &mut layout.items {
            item.y += shift;
        }
        layout.height = bottom - top + 2.0 * margin;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(text: &str, count: usize) -> AnchorRecord {
        AnchorRecord {
            text: text.to_string(),
            hrefs: vec![format!("https://a.test/{}", count)],
            count,
            pages: vec!["https://a.test/".to_string()],
            destinations: Vec::new(),
        }
    }

    fn sample(n: usize) -> Vec<AnchorRecord> {
        (0..n)
            .map(|i| record(&format!("anchor text {}", i), 1 + (i * 7919) % 40))
            .collect()
    }

    #[test]
    fn test_color_buckets() {
        assert_eq!(ColorBucket::for_ratio(1.0), ColorBucket::Highest);
        assert_eq!(ColorBucket::for_ratio(0.8), ColorBucket::Highest);
        assert_eq!(ColorBucket::for_ratio(0.79), ColorBucket::High);
        assert_eq!(ColorBucket::for_ratio(0.6), ColorBucket::High);
        assert_eq!(ColorBucket::for_ratio(0.4), ColorBucket::Medium);
        assert_eq!(ColorBucket::for_ratio(0.2), ColorBucket::Low);
        assert_eq!(ColorBucket::for_ratio(0.19), ColorBucket::Lowest);
        assert_eq!(ColorBucket::Highest.to_string(), "#1e40af");
    }

    #[test]
    fn test_font_size_is_logarithmic() {
        let engine = WordCloudLayoutEngine::default();
        assert_eq!(engine.font_size(1, 100), 12.0);
        assert_eq!(engine.font_size(100, 100), 48.0);
        assert!((engine.font_size(10, 100) - 30.0).abs() < 1e-9);
        // A single-count set stays at the minimum.
        assert_eq!(engine.font_size(1, 1), 12.0);
    }

    #[test]
    fn test_estimated_height_is_clamped() {
        let engine = WordCloudLayoutEngine::default();
        assert_eq!(engine.estimated_height(0, 900.0), 300.0);
        // 6 words per row, 12 items -> 2 rows.
        assert_eq!(engine.estimated_height(12, 900.0), 320.0);
        assert_eq!(engine.estimated_height(100, 150.0), 800.0);
        // Narrower than one word still counts one per row.
        assert_eq!(engine.estimated_height(2, 10.0), 320.0);
    }

    #[test]
    fn test_filter_and_cap() {
        let records = vec![
            record("Pricing", 3),
            record("Blog", 1),
            record("pricing plans", 5),
        ];
        let engine = WordCloudLayoutEngine::default();

        let picked = engine.candidates(&records, &AnchorFilter::new(0, "PRICING"));
        assert_eq!(
            picked.iter().map(|r| r.text.as_str()).collect::<Vec<_>>(),
            vec!["pricing plans", "Pricing"]
        );

        let picked = engine.candidates(&records, &AnchorFilter::new(2, ""));
        assert_eq!(picked.len(), 2);

        let many = sample(250);
        assert_eq!(engine.candidates(&many, &AnchorFilter::default()).len(), 100);
    }

    #[test]
    fn test_padded_boxes_never_overlap() {
        let records = sample(100);
        let engine = WordCloudLayoutEngine::default();
        let layout = engine.layout(&records, &AnchorFilter::default(), 800.0);

        assert!(!layout.items.is_empty());
        for (i, a) in layout.items.iter().enumerate() {
            for b in &layout.items[i + 1..] {
                assert!(
                    !a.padded().intersects(&b.padded()),
                    "{} overlaps {}",
                    a.record.text,
                    b.record.text
                );
            }
        }
        assert_eq!(layout.items.len() + layout.dropped.len(), 100);
    }

    #[test]
    fn test_font_size_monotonic_in_count() {
        let records = sample(100);
        let engine = WordCloudLayoutEngine::default();
        let layout = engine.layout(&records, &AnchorFilter::default(), 500.0);

        for a in &layout.items {
            for b in &layout.items {
                if a.record.count > b.record.count {
                    assert!(a.font_size_px >= b.font_size_px);
                }
            }
        }
    }

    #[test]
    fn test_layout_is_deterministic() {
        let records = sample(60);
        let engine = WordCloudLayoutEngine::default();
        let filter = AnchorFilter::new(2, "anchor");
        assert_eq!(
            engine.layout(&records, &filter, 640.0),
            engine.layout(&records, &filter, 640.0)
        );
    }

    #[test]
    fn test_height_fits_content() {
        let records = vec![record("Home", 4), record("About", 2)];
        let engine = WordCloudLayoutEngine::default();
        let layout = engine.layout(&records, &AnchorFilter::default(), 1000.0);

        assert_eq!(layout.items.len(), 2);
        let top = layout.items.iter().map(|i| i.y).fold(f64::INFINITY, f64::min);
        let bottom = layout
            .items
            .iter()
            .map(|i| i.y + i.height)
            .fold(f64::NEG_INFINITY, f64::max);
        assert!((top - 20.0).abs() < 1e-9);
        assert!((layout.height - (bottom + 20.0)).abs() < 1e-9);
        assert!(layout.height < 300.0);
        // Items stay inside the horizontal bounds.
        assert!(layout.items.iter().all(|i| i.x >= 0.0 && i.x + i.width <= 1000.0));
    }

    #[test]
    fn test_oversized_text_is_dropped() {
        let records = vec![record(&"x".repeat(200), 3), record("ok", 1)];
        let engine = WordCloudLayoutEngine::default();
        let layout = engine.layout(&records, &AnchorFilter::default(), 300.0);

        assert_eq!(layout.dropped.len(), 1);
        assert_eq!(layout.items.len(), 1);
        assert_eq!(layout.items[0].record.text, "ok");
    }

    #[test]
    fn test_retry_shrinks_font() {
        // Wide enough for the word only at the retry size.
        let records = vec![record("abcdefghij", 10), record("z", 1)];
        let engine = WordCloudLayoutEngine::default();
        // 10 chars * 48px * 0.6 = 288 wide; at 75% that is 216.
        let layout = engine.layout(&records, &AnchorFilter::default(), 250.0);

        let item = layout
            .items
            .iter()
            .find(|i| i.record.text == "abcdefghij")
            .unwrap();
        assert_eq!(item.font_size_px, 36.0);
        assert!(item.x >= 0.0 && item.x + item.width <= 250.0);
    }

    #[test]
    fn test_unusable_width_drops_everything() {
        let records = vec![record("Home", 2)];
        let engine = WordCloudLayoutEngine::default();
        let layout = engine.layout(&records, &AnchorFilter::default(), 0.0);
        assert!(layout.is_empty());
        assert_eq!(layout.dropped.len(), 1);
    }

    #[test]
    fn test_degenerate_spiral_still_terminates() {
        let config = LayoutConfig {
            spiral_spacing: 0.0,
            spiral_step: 0.0,
            ..LayoutConfig::default()
        };
        let engine = WordCloudLayoutEngine::new(config, FixedWidthMeasurer::default());
        let records = sample(10);

        let layout = engine.layout(&records, &AnchorFilter::default(), 400.0);
        assert!(!layout.items.is_empty());
        assert_eq!(layout.items.len() + layout.dropped.len(), 10);

        let negative = LayoutConfig {
            spiral_spacing: -4.0,
            spiral_step: f64::NAN,
            ..LayoutConfig::default()
        };
        let engine = WordCloudLayoutEngine::new(negative, FixedWidthMeasurer::default());
        let layout = engine.layout(&records, &AnchorFilter::default(), 400.0);
        assert_eq!(layout.items.len() + layout.dropped.len(), 10);
    }

    #[test]
    fn test_rect_touching_is_not_overlap() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 10.0, 10.0);
        assert!(!a.intersects(&b));
        assert!(a.intersects(&Rect::new(9.0, 9.0, 5.0, 5.0)));
    }
}
