//! Confidence extraction from Tesseract's `tsv` output.
//!
//! Columns: `level page_num block_num par_num line_num word_num left top
//! width height conf text`.  Only word rows (level 5) carry a meaningful
//! `conf`; structural rows report `-1`.

const WORD_LEVEL: &str = "5";
const CONF_COLUMN: usize = 10;

/// Mean word confidence in `[0, 100]`, or `None` when no word was found.
///
/// ```
/// use math_ocr::ocr::mean_word_confidence;
///
/// let tsv = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n\
///            5\t1\t1\t1\t1\t1\t10\t10\t40\t20\t90.5\tx=5\n\
///            5\t1\t1\t1\t1\t2\t60\t10\t40\t20\t70.5\ty=2\n";
/// assert_eq!(mean_word_confidence(tsv), Some(80.5));
/// ```
pub fn mean_word_confidence(tsv: &str) -> Option<f32> {
    let mut sum = 0.0f64;
    let mut count = 0usize;

    for line in tsv.lines().skip(1) {
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.first() != Some(&WORD_LEVEL) {
            continue;
        }
        let Some(conf) = cols.get(CONF_COLUMN).and_then(|c| c.trim().parse::<f64>().ok()) else {
            continue;
        };
        if conf < 0.0 {
            continue;
        }
        sum += conf;
        count += 1;
    }

    if count == 0 {
        None
    } else {
        Some((sum / count as f64).clamp(0.0, 100.0) as f32)
    }
}
