/// SAM flag bits
pub const BAM_FPAIRED: u16 = 0x1;
pub const BAM_FUNMAP: u16 = 0x4;
pub const BAM_FMUNMAP: u16 = 0x8;
pub const BAM_FSECONDARY: u16 = 0x100;
pub const BAM_FQCFAIL: u16 = 0x200;
pub const BAM_FDUP: u16 = 0x400;

/// CIGAR operation with its length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CigarOp {
    Match(u32),
    Ins(u32),
    Del(u32),
    RefSkip(u32),
    SoftClip(u32),
    HardClip(u32),
    Pad(u32),
    Equal(u32),
    Diff(u32),
}

impl CigarOp {
    /// (consumes query, consumes reference, length)
    fn consumes(&self) -> (bool, bool, u32) {
        match *self {
            Self::Match(l) | Self::Equal(l) | Self::Diff(l) => (true, true, l),
            Self::Ins(l) | Self::SoftClip(l) => (true, false, l),
            Self::Del(l) | Self::RefSkip(l) => (false, true, l),
            Self::HardClip(l) | Self::Pad(l) => (false, false, l),
        }
    }
}

/// Alignment record as seen by the coverage calculation
///
/// The buffers are reused between reads, so a single Record is filled
/// repeatedly by a [RecordReader](crate::input::RecordReader)
#[derive(Debug, Default, Clone)]
pub struct Record {
    mapq: u8,
    flag: u16,
    // 1-based position of the first reference base covered by the alignment
    pos: usize,
    qual: Vec<u8>,
    cigar: Vec<CigarOp>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn set(&mut self, mapq: u8, flag: u16, pos: usize, qual: &[u8], cigar: &[CigarOp]) {
        self.mapq = mapq;
        self.flag = flag;
        self.pos = pos;
        self.qual.clear();
        self.qual.extend_from_slice(qual);
        self.cigar.clear();
        self.cigar.extend_from_slice(cigar);
    }

    pub(crate) fn set_header(&mut self, mapq: u8, flag: u16, pos: usize) {
        self.mapq = mapq;
        self.flag = flag;
        self.pos = pos;
    }

    pub(crate) fn qual_mut(&mut self) -> &mut Vec<u8> {
        &mut self.qual
    }

    pub(crate) fn cigar_mut(&mut self) -> &mut Vec<CigarOp> {
        &mut self.cigar
    }

    pub fn mapq(&self) -> u8 {
        self.mapq
    }
    pub fn flag(&self) -> u16 {
        self.flag
    }
    pub fn pos(&self) -> usize {
        self.pos
    }
    pub fn qual(&self) -> &[u8] {
        &self.qual
    }

    pub fn is_paired(&self) -> bool {
        (self.flag & BAM_FPAIRED) != 0
    }
    pub fn is_mate_unmapped(&self) -> bool {
        (self.flag & BAM_FMUNMAP) != 0
    }
    pub fn is_duplicate(&self) -> bool {
        (self.flag & BAM_FDUP) != 0
    }

    /// Reference position (1-based) for each base of the read, or None
    /// where the base does not align to the reference (insertions, soft clips)
    pub fn ref_positions(&self) -> RefPositions<'_> {
        RefPositions {
            ops: self.cigar.iter(),
            ref_pos: self.pos,
            remaining: 0,
            state: (false, false),
        }
    }
}

/// Iterator over per-base reference positions of a read
pub struct RefPositions<'a> {
    ops: std::slice::Iter<'a, CigarOp>,
    ref_pos: usize,
    remaining: u32,
    // (consumes query, consumes reference) for the current op
    state: (bool, bool),
}

impl<'a> Iterator for RefPositions<'a> {
    type Item = Option<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining == 0 {
            let (q, r, l) = self.ops.next()?.consumes();
            if q {
                self.state = (q, r);
                self.remaining = l;
            } else if r {
                // Deletions and skips only move along the reference
                self.ref_pos += l as usize;
            }
        }
        self.remaining -= 1;
        Some(if self.state.1 {
            let x = self.ref_pos;
            self.ref_pos += 1;
            Some(x)
        } else {
            None
        })
    }
}
