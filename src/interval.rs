/// A CNV call held in the interval pool, either read from an input source or
/// produced by merging two overlapping calls.
///
/// ## Field interpretation:
/// - `source_mask`: one bit per contributing source (bit 0 proband, bit 1 father, bit 2 mother)
/// - `merge_target`: id of the interval this one was absorbed into, `None` while active
/// - `rank`: 1 for raw calls, `max(parent ranks) + 1` for merged calls
/// - `detail`: source rows of every raw call in the lineage, joined by [`DETAIL_SEPARATOR`]
#[derive(Debug, Clone, PartialEq)]
pub struct CnvInterval {
    pub(crate) id: usize,
    pub(crate) chromosome: String,
    pub(crate) start: i32,
    pub(crate) end: i32,
    pub(crate) source_mask: SourceMask,
    pub(crate) rank: u32,
    pub(crate) detail: String,
    pub(crate) merge_target: Option<usize>,
}

/// Separator placed between the details of two merged parents
pub const DETAIL_SEPARATOR: &str = "<br>";

impl CnvInterval {
    /// Build a raw call from the first three fields of an input row.
    /// The row is kept verbatim in the detail, prefixed with the source mask.
    pub fn raw(
        chromosome: &str,
        start: i32,
        end: i32,
        source_mask: SourceMask,
        fields: &[&str],
    ) -> Self {
        Self {
            id: 0,
            chromosome: chromosome.to_string(),
            start,
            end,
            source_mask,
            rank: 1,
            detail: format!("{}\t{}", source_mask, fields.join("\t")),
            merge_target: None,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn chromosome(&self) -> &str {
        &self.chromosome
    }

    pub fn start(&self) -> i32 {
        self.start
    }

    pub fn end(&self) -> i32 {
        self.end
    }

    /// Length of the half-open interval; inverted intervals count as empty.
    /// Computed in `i64` so far-apart coordinates cannot overflow.
    pub fn len(&self) -> i64 {
        (i64::from(self.end) - i64::from(self.start)).max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn source_mask(&self) -> SourceMask {
        self.source_mask
    }

    pub fn rank(&self) -> u32 {
        self.rank
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn merge_target(&self) -> Option<usize> {
        self.merge_target
    }

    pub fn is_retired(&self) -> bool {
        self.merge_target.is_some()
    }

    /// Combine two overlapping calls into the interval that absorbs them.
    /// The returned interval has no id yet; the pool assigns one on append.
    pub(crate) fn merged(a: &CnvInterval, b: &CnvInterval) -> Self {
        debug_assert_eq!(
            a.chromosome, b.chromosome,
            "merging intervals on different chromosomes"
        );
        let mut detail =
            String::with_capacity(a.detail.len() + DETAIL_SEPARATOR.len() + b.detail.len());
        detail.push_str(&a.detail);
        detail.push_str(DETAIL_SEPARATOR);
        detail.push_str(&b.detail);

        Self {
            id: 0,
            chromosome: a.chromosome.clone(),
            start: a.start.min(b.start),
            end: a.end.max(b.end),
            source_mask: a.source_mask | b.source_mask,
            rank: a.rank.max(b.rank) + 1,
            detail,
            merge_target: None,
        }
    }
}

/// Bitmask over the three contributing sources
#[derive(Default, PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord)]
pub struct SourceMask(u8);

impl SourceMask {
    pub const PROBAND: SourceMask = SourceMask(0b001);
    pub const FATHER: SourceMask = SourceMask(0b010);
    pub const MOTHER: SourceMask = SourceMask(0b100);

    /// Bits a mask may use
    pub const ALL: SourceMask = SourceMask(0b111);

    pub fn new(bits: u8) -> Self {
        SourceMask(bits)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    /// True if every bit of `other` is also set in `self`
    pub fn contains(&self, other: SourceMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(&self, other: SourceMask) -> bool {
        self.0 & other.0 != 0
    }
}

impl std::ops::BitOr for SourceMask {
    type Output = SourceMask;

    fn bitor(self, rhs: SourceMask) -> SourceMask {
        SourceMask(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for SourceMask {
    fn bitor_assign(&mut self, rhs: SourceMask) {
        self.0 |= rhs.0;
    }
}

// Rendered as a fixed-width 3-bit binary string, e.g. "011"
impl std::fmt::Display for SourceMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:03b}", self.0)
    }
}

/// The three inputs of a trio analysis
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[repr(usize)]
pub enum Source {
    Proband = 0,
    Father = 1,
    Mother = 2,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Proband, Source::Father, Source::Mother];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Proband => write!(f, "proband"),
            Source::Father => write!(f, "father"),
            Source::Mother => write!(f, "mother"),
        }
    }
}
