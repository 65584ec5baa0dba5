//! HID report-descriptor parsing.
//!
//! A report descriptor is a compact binary grammar: a stream of items,
//! each one header byte (payload size in the low 2 bits, item class in
//! bits 2..3, tag in the high nibble) followed by 0/1/2/4 payload
//! bytes. We only need enough of the grammar to find which feature
//! report drives the touchpad switch: usage pages, report ids, usages,
//! and the three report-closing main items.
//!
//! The scan must track the size table and masks exactly — a wrong
//! payload size desynchronizes every item after it.

pub mod raw;

/// Payload byte counts indexed by the header's low 2 bits.
const ITEM_SIZE: [usize; 4] = [0, 1, 2, 4];

// Item classes (header bits 2..3).
const TYPE_MAIN: u8 = 0;
const TYPE_GLOBAL: u8 = 1;
const TYPE_LOCAL: u8 = 2;

// Main items (header & 0xFC).
const MAIN_INPUT: u8 = 0x80;
const MAIN_OUTPUT: u8 = 0x90;
const MAIN_FEATURE: u8 = 0xB0;

// Global items.
const GLOBAL_USAGE_PAGE: u8 = 0x04;
const GLOBAL_REPORT_ID: u8 = 0x84;

// Local items.
const LOCAL_USAGE: u8 = 0x08;

/// Usage pages / ids the touchpad controller cares about.
pub const USAGE_PAGE_DIGITIZER: u32 = 0x0D;
pub const USAGE_DIGITIZER_SURFACE_SWITCH: u32 = 0x57;
pub const USAGE_DIGITIZER_BUTTON_SWITCH: u32 = 0x58;

/// Combine a usage page and usage id into the single value stored on a
/// report: `(page << 16) | id`.
pub const fn usage(page: u32, id: u32) -> u32 {
    (page << 16) | id
}

/// What a report carries: device → host, host → device, or
/// bidirectional configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Input,
    Output,
    Feature,
}

/// One report declared by a descriptor: its id, direction, and the
/// usages accumulated since the previous main item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HidReport {
    pub id: u8,
    pub kind: ReportKind,
    pub usages: Vec<u32>,
}

/// Parse a raw report descriptor into its declared reports.
///
/// A truncated descriptor (header promising more payload than remains)
/// ends the scan; everything completed before the truncation point is
/// returned. Malformed input never panics — the caller treats missing
/// reports as absent capabilities.
pub fn parse(data: &[u8]) -> Vec<HidReport> {
    let mut reports = Vec::new();
    let mut usages: Vec<u32> = Vec::new();
    let mut usage_page: u32 = 0;
    let mut report_id: u8 = 0;

    let mut n = 0;
    while n < data.len() {
        let header = data[n];
        let size = ITEM_SIZE[(header & 0x03) as usize];
        let class = (header & 0x0C) >> 2;
        let tag = header & 0xFC;

        if n + 1 + size > data.len() {
            // Truncated payload: abort, keep what we have.
            break;
        }
        let value = read_le(&data[n + 1..n + 1 + size]);

        match class {
            TYPE_MAIN => {
                let kind = match tag {
                    MAIN_INPUT => Some(ReportKind::Input),
                    MAIN_OUTPUT => Some(ReportKind::Output),
                    MAIN_FEATURE => Some(ReportKind::Feature),
                    // Collection / End Collection: no report boundary.
                    _ => None,
                };
                if let Some(kind) = kind {
                    reports.push(HidReport {
                        id: report_id,
                        kind,
                        usages: std::mem::take(&mut usages),
                    });
                }
            }
            TYPE_GLOBAL => match tag {
                GLOBAL_USAGE_PAGE => usage_page = value,
                GLOBAL_REPORT_ID => report_id = value as u8,
                _ => {}
            },
            TYPE_LOCAL => {
                if tag == LOCAL_USAGE {
                    usages.push(usage(usage_page, value));
                }
            }
            _ => {}
        }

        n += 1 + size;
    }

    reports
}

/// Little-endian payload bytes as a u32 (0 bytes → 0).
fn read_le(bytes: &[u8]) -> u32 {
    let mut v: u32 = 0;
    for (i, b) in bytes.iter().enumerate() {
        v |= (*b as u32) << (8 * i);
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimal descriptor builder for synthetic inputs.
    struct Builder(Vec<u8>);

    impl Builder {
        fn new() -> Self {
            Self(Vec::new())
        }
        fn usage_page(mut self, page: u8) -> Self {
            self.0.extend_from_slice(&[0x05, page]);
            self
        }
        fn report_id(mut self, id: u8) -> Self {
            self.0.extend_from_slice(&[0x85, id]);
            self
        }
        fn usage(mut self, id: u8) -> Self {
            self.0.extend_from_slice(&[0x09, id]);
            self
        }
        fn feature(mut self) -> Self {
            self.0.extend_from_slice(&[0xB1, 0x02]);
            self
        }
        fn input(mut self) -> Self {
            self.0.extend_from_slice(&[0x81, 0x02]);
            self
        }
        fn build(self) -> Vec<u8> {
            self.0
        }
    }

    #[test]
    fn feature_reports_carry_pending_usages() {
        let desc = Builder::new()
            .usage_page(0x0D)
            .report_id(7)
            .usage(0x57)
            .usage(0x58)
            .feature()
            .usage(0x22)
            .feature()
            .build();

        let reports = parse(&desc);
        let features: Vec<_> = reports
            .iter()
            .filter(|r| r.kind == ReportKind::Feature)
            .collect();
        assert_eq!(features.len(), 2);

        assert_eq!(features[0].id, 7);
        assert_eq!(
            features[0].usages,
            vec![usage(0x0D, 0x57), usage(0x0D, 0x58)]
        );
        // Pending usages are cleared at each main item.
        assert_eq!(features[1].usages, vec![usage(0x0D, 0x22)]);
    }

    #[test]
    fn input_and_feature_kinds_are_distinguished() {
        let desc = Builder::new()
            .usage_page(0x01)
            .report_id(1)
            .usage(0x30)
            .input()
            .usage(0x31)
            .feature()
            .build();

        let reports = parse(&desc);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].kind, ReportKind::Input);
        assert_eq!(reports[1].kind, ReportKind::Feature);
    }

    #[test]
    fn report_id_applies_until_changed() {
        let desc = Builder::new()
            .usage_page(0x0D)
            .report_id(4)
            .usage(0x57)
            .feature()
            .report_id(9)
            .usage(0x58)
            .feature()
            .build();

        let reports = parse(&desc);
        assert_eq!(reports[0].id, 4);
        assert_eq!(reports[1].id, 9);
    }

    #[test]
    fn truncated_descriptor_keeps_completed_reports() {
        let mut desc = Builder::new()
            .usage_page(0x0D)
            .report_id(7)
            .usage(0x57)
            .feature()
            .build();
        // A usage item header promising one payload byte that is absent.
        desc.push(0x09);

        let reports = parse(&desc);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].kind, ReportKind::Feature);
        assert_eq!(reports[0].usages, vec![usage(0x0D, 0x57)]);
    }

    #[test]
    fn truncated_multibyte_payload_does_not_panic() {
        // 0x0A = local usage, 2 payload bytes; only one present.
        let desc = vec![0x05, 0x0D, 0x0A, 0x57];
        let reports = parse(&desc);
        assert!(reports.is_empty());
    }

    #[test]
    fn empty_descriptor_yields_no_reports() {
        assert!(parse(&[]).is_empty());
    }

    #[test]
    fn multibyte_usage_values_read_little_endian() {
        // Usage page 0x0D, then a 2-byte usage 0x0102.
        let desc = vec![0x05, 0x0D, 0x0A, 0x02, 0x01, 0xB1, 0x02];
        let reports = parse(&desc);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].usages, vec![usage(0x0D, 0x0102)]);
    }
}
