//! Text cluster reports
//!
//! Renders a header block, one row per cluster and an optional totals row.
//! In 1D format (the default) every non-data line starts with `#`, so the
//! output can be read back as a numeric table.

use crate::coords::Orientation;
use crate::grid::VoxelType;
use crate::stats::{ClusterReport, ClusterStats, GlobalStats};

/// Report layout switches
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReportStyle {
    /// Prefix comment lines with `#` and data rows with a space
    pub one_d_format: bool,
    /// Suppress header lines
    pub quiet: bool,
    /// Only print the totals
    pub summarize: bool,
    /// Never print the totals row
    pub nosum: bool,
    /// Print ` 0` after a no-cluster message
    pub report_zero: bool,
}

impl Default for ReportStyle {
    fn default() -> Self {
        Self { one_d_format: true, quiet: false, summarize: false, nosum: false, report_zero: false }
    }
}

impl ReportStyle {
    fn comment(&self) -> &'static str {
        if self.one_d_format { "#" } else { "" }
    }

    fn row(&self) -> &'static str {
        if self.one_d_format { " " } else { "" }
    }
}

/// Dataset facts printed in the header block
#[derive(Clone, Debug, PartialEq)]
pub struct ReportHeader {
    pub source: String,
    pub mni: bool,
    /// Connectivity radius in mm
    pub radius: f64,
    /// Minimum cluster size in voxels
    pub min_points: usize,
    /// True voxel dimensions
    pub voxel_size: (f64, f64, f64),
    /// Distances and volumes were computed with unit spacing
    pub fake_spacing: bool,
    pub datum: VoxelType,
    pub orientation: Orientation,
    /// Number of voxels kept by the mask, when one was applied
    pub mask_voxels: Option<usize>,
    pub signed_mean: bool,
}

/// What the clustering produced
#[derive(Clone, Copy, Debug)]
pub enum ReportBody<'a> {
    /// No cluster reached the minimum size, or no active voxels at all
    NoClusters,
    /// Retained clusters; an empty global row means every one was degenerate
    Clusters(&'a ClusterReport),
}

/// Format a value in at most 7 characters (more only for huge integers).
///
/// Integers below 99999 in magnitude print as integers; other values get a
/// precision chosen from their magnitude with trailing zeros removed, and
/// exponent notation outside roughly 0.001 to 99999.
pub fn format_fc7(value: f64) -> String {
    if !value.is_finite() {
        return format!("{:>7}", value);
    }

    let lv = value as i64;
    if value == lv as f64 && lv.abs() < 99_999 {
        return if lv >= 0 { format!(" {}", lv) } else { format!("{}", lv) };
    }

    let magnitude = (10.0001 + value.abs().log10()) as i64;
    match magnitude {
        7..=10 => strip_zeros(format!("{:7.4}", value)),
        11 => strip_zeros(format!("{:7.3}", value)),
        12 => strip_zeros(format!("{:7.2}", value)),
        13 => strip_zeros(format!("{:7.1}", value)),
        14 => format!("{:7.0}", value),
        _ => {
            let precision = if value > 0.0 { 1 } else { 0 };
            format!("{:>7}", exponent(value, precision))
        }
    }
}

/// Drop trailing zeros between the 3rd and 7th characters
fn strip_zeros(mut s: String) -> String {
    let mut il = 6;
    while il > 1 && s.as_bytes().get(il) == Some(&b'0') {
        s.truncate(il);
        il -= 1;
    }
    s
}

/// Exponent notation with a signed two-digit exponent, e.g. `1.2e+05`
fn exponent(value: f64, precision: usize) -> String {
    let s = format!("{:.*e}", precision, value);
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let e: i32 = exp.parse().unwrap_or(0);
            let sign = if e < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, e.abs())
        }
        None => s,
    }
}

/// Column tag for an orientation letter: the letter then its opposite
fn axis_tag(letter: char) -> &'static str {
    match letter {
        'R' => "RL",
        'L' => "LR",
        'A' => "AP",
        'P' => "PA",
        'I' => "IS",
        'S' => "SI",
        _ => "??",
    }
}

fn mean_convention(signed: bool) -> &'static str {
    if signed {
        "Mean and SEM based on Signed voxel intensities: "
    } else {
        "Mean and SEM based on Absolute Value of voxel intensities: "
    }
}

fn push_header(out: &mut String, header: &ReportHeader, style: &ReportStyle) {
    let c = style.comment();
    let [x, y, z] = header.orientation.axis_labels().map(axis_tag);
    let (dx, dy, dz) = header.voxel_size;
    let mni = if header.mni { "[MNI coords]" } else { "" };

    if style.summarize {
        out.push_str(&format!("{}{}\n", c, mean_convention(header.signed_mean)));
        out.push_str(&format!("{}Cluster summary for file {} {}\n", c, header.source, mni));
        out.push_str(&format!("{}Volume  CM {}  CM {}  CM {}  Mean    SEM    \n", c, x, y, z));
        return;
    }

    out.push_str(&format!("{}\n", c));
    out.push_str(&format!("{}Cluster report for file {} {}\n", c, header.source, mni));
    out.push_str(&format!(
        "{}[Connectivity radius = {:.2} mm  Volume threshold = {:.2} ]\n",
        c,
        header.radius,
        header.min_points as f64 * dx * dy * dz
    ));
    out.push_str(&format!("{}[Single voxel volume = {:.1} (microliters) ]\n", c, dx * dy * dz));
    out.push_str(&format!("{}[Voxel datum type    = {} ]\n", c, header.datum.name()));
    out.push_str(&format!("{}[Voxel dimensions    = {:.3} mm X {:.3} mm X {:.3} mm ]\n", c, dx, dy, dz));
    out.push_str(&format!("{}[Coordinates Order   = {} ]\n", c, header.orientation.code()));
    if header.fake_spacing {
        out.push_str(&format!("{}[Fake voxel dimen    = 1.000 mm X 1.000 mm X 1.000 mm ]\n", c));
    }
    if let Some(n) = header.mask_voxels {
        out.push_str(&format!("{}[Using mask: {} voxels ]\n", c, n));
    }
    out.push_str(&format!("{}{}\n{}\n", c, mean_convention(header.signed_mean), c));

    out.push_str(&format!(
        "{c}Volume  CM {x}  CM {y}  CM {z}  min{x}  max{x}  min{y}  max{y}  min{z}  max{z}    Mean     SEM    Max Int  MI {x}  MI {y}  MI {z}\n"
    ));
    out.push_str(&format!("{}{}\n", c, TABLE_RULE));
}

const TABLE_RULE: &str =
    "------  -----  -----  -----  -----  -----  -----  -----  -----  -----  -------  -------  -------  -----  -----  -----";

fn push_cluster_row(out: &mut String, s: &ClusterStats, style: &ReportStyle) {
    out.push_str(&format!(
        "{}{:6.0}  {:5.1}  {:5.1}  {:5.1}  {:5.1}  {:5.1}  {:5.1}  {:5.1}  {:5.1}  {:5.1}  {:>7}  {:>7}  {:>7}  {:5.1}  {:5.1}  {:5.1} \n",
        style.row(),
        s.volume,
        s.centroid[0],
        s.centroid[1],
        s.centroid[2],
        s.min[0],
        s.max[0],
        s.min[1],
        s.max[1],
        s.min[2],
        s.max[2],
        format_fc7(s.mean),
        format_fc7(s.sem),
        format_fc7(s.max_value),
        s.max_location[0],
        s.max_location[1],
        s.max_location[2],
    ));
}

fn push_totals(out: &mut String, g: &GlobalStats, style: &ReportStyle) {
    let c = style.comment();
    if style.summarize {
        if !style.quiet {
            out.push_str(&format!("{}------  -----  -----  ----- -------- -------- \n", c));
        }
        out.push_str(&format!(
            "{}{:6.0}  {:5.1}  {:5.1}  {:5.1} {:8.1} {:6.3}\n",
            c, g.volume, g.centroid[0], g.centroid[1], g.centroid[2], g.mean, g.sem
        ));
    } else if g.n_clusters > 1 && !style.nosum {
        if !style.quiet {
            out.push_str(&format!("{}{}\n", c, TABLE_RULE));
        }
        out.push_str(&format!(
            "{}{:6.0}  {:5.1}  {:5.1}  {:5.1}{:44}{:>7}  {:>7}{:29}\n",
            c,
            g.volume,
            g.centroid[0],
            g.centroid[1],
            g.centroid[2],
            "",
            format_fc7(g.mean),
            format_fc7(g.sem),
            "",
        ));
    }
}

fn push_none(out: &mut String, message: &str, style: &ReportStyle) {
    out.push_str(&format!("{}** {} ***\n", style.comment(), message));
    if style.report_zero {
        out.push_str(" 0\n");
    }
}

/// Render the full report for one dataset.
///
/// # Arguments
/// * `header` - Dataset facts for the header block
/// * `body` - Clustering outcome
/// * `style` - Layout switches
///
/// # Returns
/// The report text, newline terminated
pub fn render_report(header: &ReportHeader, body: ReportBody<'_>, style: &ReportStyle) -> String {
    let mut out = String::new();
    if !style.quiet {
        push_header(&mut out, header, style);
    }

    match body {
        ReportBody::NoClusters => push_none(&mut out, "NO CLUSTERS FOUND", style),
        ReportBody::Clusters(report) => match &report.global {
            None => push_none(&mut out, "NO CLUSTERS FOUND ABOVE THRESHOLD VOLUME", style),
            Some(global) => {
                if !style.summarize {
                    for s in &report.clusters {
                        push_cluster_row(&mut out, s, style);
                    }
                }
                push_totals(&mut out, global, style);
            }
        },
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> ReportHeader {
        ReportHeader {
            source: "func.nii".to_string(),
            mni: false,
            radius: 1.11,
            min_points: 2,
            voxel_size: (2.0, 2.0, 3.0),
            fake_spacing: true,
            datum: VoxelType::Int16,
            orientation: Orientation::RAI,
            mask_voxels: None,
            signed_mean: false,
        }
    }

    fn stats(volume: f64, mean: f64) -> ClusterStats {
        ClusterStats {
            index: 0,
            n_points: volume as usize,
            volume,
            centroid: [1.0, -2.0, 3.5],
            min: [0.0, -3.0, 3.0],
            max: [2.0, -1.0, 4.0],
            mean,
            signed_mean: mean,
            abs_mean: mean,
            sem: 0.25,
            max_value: 7.0,
            max_location: [2.0, -1.0, 4.0],
        }
    }

    fn two_cluster_report() -> ClusterReport {
        ClusterReport {
            clusters: vec![stats(8.0, 2.5), stats(3.0, 1.0)],
            degenerate: vec![],
            global: Some(GlobalStats {
                n_clusters: 2,
                n_points: 11,
                volume: 11.0,
                centroid: [1.0, -2.0, 3.5],
                mean: 2.0,
                sem: 0.125,
            }),
        }
    }

    #[test]
    fn test_fc7_integers() {
        assert_eq!(format_fc7(0.0), " 0");
        assert_eq!(format_fc7(42.0), " 42");
        assert_eq!(format_fc7(-7.0), "-7");
        assert_eq!(format_fc7(99998.0), " 99998");
        assert_eq!(format_fc7(-99998.0), "-99998");
    }

    #[test]
    fn test_fc7_integer_limit() {
        // 99999 itself is past the integer branch
        assert_eq!(format_fc7(99999.0), "1.0e+05");
        assert_eq!(format_fc7(-99999.0), " -1e+05");
        assert_eq!(format_fc7(100000.0), "1.0e+05");
    }

    #[test]
    fn test_fc7_strips_trailing_zeros() {
        assert_eq!(format_fc7(2.5), " 2.5");
        assert_eq!(format_fc7(0.5), " 0.5");
        assert_eq!(format_fc7(-1.25), "-1.25");
        assert_eq!(format_fc7(12.125), " 12.125");
        assert_eq!(format_fc7(0.0123), " 0.0123");
        assert_eq!(format_fc7(123.5), " 123.5");
        assert_eq!(format_fc7(2048.5), " 2048.5");
    }

    #[test]
    fn test_fc7_large_and_small() {
        assert_eq!(format_fc7(12345.6), "  12346");
        assert_eq!(format_fc7(123456.7), "1.2e+05");
        assert_eq!(format_fc7(-123456.7), " -1e+05");
        assert_eq!(format_fc7(0.000123), "1.2e-04");
    }

    #[test]
    fn test_axis_tags() {
        assert_eq!(Orientation::RAI.axis_labels().map(axis_tag), ["RL", "AP", "IS"]);
        assert_eq!(Orientation::LPI.axis_labels().map(axis_tag), ["LR", "PA", "IS"]);
    }

    #[test]
    fn test_header_block() {
        let text = render_report(&header(), ReportBody::NoClusters, &ReportStyle::default());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "#");
        assert_eq!(lines[1], "#Cluster report for file func.nii ");
        assert_eq!(lines[2], "#[Connectivity radius = 1.11 mm  Volume threshold = 24.00 ]");
        assert_eq!(lines[3], "#[Single voxel volume = 12.0 (microliters) ]");
        assert_eq!(lines[4], "#[Voxel datum type    = short ]");
        assert_eq!(lines[5], "#[Voxel dimensions    = 2.000 mm X 2.000 mm X 3.000 mm ]");
        assert_eq!(lines[6], "#[Coordinates Order   = RAI ]");
        assert!(lines[7].starts_with("#[Fake voxel dimen"));
        assert!(lines[8].contains("Absolute Value"));
        assert!(lines[10].starts_with("#Volume  CM RL  CM AP  CM IS  minRL  maxRL"));
        assert_eq!(*lines.last().unwrap(), "#** NO CLUSTERS FOUND ***");
    }

    #[test]
    fn test_table_rows_and_totals() {
        let report = two_cluster_report();
        let text = render_report(&header(), ReportBody::Clusters(&report), &ReportStyle::default());
        let rows: Vec<&str> = text.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            "      8    1.0   -2.0    3.5    0.0    2.0   -3.0   -1.0    3.0    4.0      2.5     0.25        7    2.0   -1.0    4.0 "
        );
        let totals = text.lines().last().unwrap();
        assert!(totals.starts_with("#    11    1.0   -2.0    3.5"));
        assert!(totals.contains("      2    0.125"));
    }

    #[test]
    fn test_nosum_and_single_cluster_skip_totals() {
        let report = two_cluster_report();
        let style = ReportStyle { nosum: true, ..Default::default() };
        let text = render_report(&header(), ReportBody::Clusters(&report), &style);
        assert!(!text.contains("#    11"));

        let mut single = two_cluster_report();
        single.clusters.truncate(1);
        if let Some(g) = single.global.as_mut() {
            g.n_clusters = 1;
        }
        let text = render_report(&header(), ReportBody::Clusters(&single), &ReportStyle::default());
        assert_eq!(text.lines().filter(|l| !l.starts_with('#')).count(), 1);
        assert!(!text.lines().last().unwrap().starts_with('#'));
    }

    #[test]
    fn test_summarize_prints_only_totals() {
        let report = two_cluster_report();
        let style = ReportStyle { summarize: true, ..Default::default() };
        let text = render_report(&header(), ReportBody::Clusters(&report), &style);
        assert!(text.contains("#Cluster summary for file func.nii"));
        assert!(text.contains("#Volume  CM RL  CM AP  CM IS  Mean    SEM"));
        assert_eq!(text.lines().last().unwrap(), "#    11    1.0   -2.0    3.5      2.0  0.125");
    }

    #[test]
    fn test_quiet_plain_format_and_report_zero() {
        let style = ReportStyle { quiet: true, one_d_format: false, report_zero: true, ..Default::default() };
        let text = render_report(&header(), ReportBody::NoClusters, &style);
        assert_eq!(text, "** NO CLUSTERS FOUND ***\n 0\n");
    }

    #[test]
    fn test_all_degenerate_reports_none_above_threshold() {
        let report = ClusterReport { clusters: vec![], degenerate: vec![0], global: None };
        let style = ReportStyle { quiet: true, ..Default::default() };
        let text = render_report(&header(), ReportBody::Clusters(&report), &style);
        assert_eq!(text, "#** NO CLUSTERS FOUND ABOVE THRESHOLD VOLUME ***\n");
    }
}
