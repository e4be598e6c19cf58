//! Chunk plans for streaming-equivalence tests.
//!
//! Deterministic plans (fixed sizes, splits around markup delimiters) plus
//! seeded fuzz plans, all at arbitrary byte offsets: the rewriter must not
//! care where a chunk ends, even inside a UTF-8 sequence.

#[derive(Clone, Debug)]
pub(crate) struct ChunkPlanCase {
    pub label: String,
    /// Sorted, deduplicated split offsets strictly inside the input.
    pub boundaries: Vec<usize>,
}

pub(crate) fn byte_chunk_plans(input: &[u8], fuzz_runs: usize, fuzz_seed: u64) -> Vec<ChunkPlanCase> {
    let len = input.len();
    let mut plans = Vec::new();

    for size in [1usize, 2, 3, 5, 8, 16, 64] {
        plans.push(ChunkPlanCase {
            label: format!("fixed size={size}"),
            boundaries: (1..len).filter(|i| i % size == 0).collect(),
        });
    }

    let delimiters = delimiter_boundaries(input);
    if !delimiters.is_empty() {
        plans.push(ChunkPlanCase {
            label: format!("delimiters count={}", delimiters.len()),
            boundaries: delimiters,
        });
    }

    if len > 1 {
        for run in 0..fuzz_runs {
            let seed = fuzz_seed.wrapping_add(run as u64);
            let mut rng = Lcg::new(seed);
            let count = 1 + rng.gen_range(32.min(len - 1));
            let mut picks: Vec<usize> = (0..count).map(|_| 1 + rng.gen_range(len - 1)).collect();
            picks.sort_unstable();
            picks.dedup();
            plans.push(ChunkPlanCase {
                label: format!("fuzz seed=0x{seed:016x}"),
                boundaries: picks,
            });
        }
    }
    plans
}

pub(crate) fn split_by_plan<'a>(input: &'a [u8], boundaries: &[usize]) -> Vec<&'a [u8]> {
    let mut chunks = Vec::with_capacity(boundaries.len() + 1);
    let mut start = 0;
    for &b in boundaries {
        chunks.push(&input[start..b]);
        start = b;
    }
    chunks.push(&input[start..]);
    chunks
}

/// Offsets on both sides of `<`, `>`, quotes and `</`.
fn delimiter_boundaries(input: &[u8]) -> Vec<usize> {
    let len = input.len();
    let mut out = Vec::new();
    for (i, &b) in input.iter().enumerate() {
        if matches!(b, b'<' | b'>' | b'"' | b'\'') {
            out.push(i);
            out.push(i + 1);
        }
        if b == b'<' && input.get(i + 1) == Some(&b'/') {
            out.push(i + 2);
        }
    }
    out.retain(|&i| i > 0 && i < len);
    out.sort_unstable();
    out.dedup();
    out
}

struct Lcg {
    state: u64,
}

impl Lcg {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    fn gen_range(&mut self, upper: usize) -> usize {
        if upper == 0 {
            return 0;
        }
        (self.next_u64() >> 32) as usize % upper
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plans_cover_the_input_exactly() {
        let input = "<p class=\"é\">x</p>".as_bytes();
        for case in byte_chunk_plans(input, 4, 7) {
            let joined: Vec<u8> = split_by_plan(input, &case.boundaries).concat();
            assert_eq!(joined, input, "plan {}", case.label);
            assert!(
                case.boundaries.windows(2).all(|w| w[0] < w[1]),
                "unsorted plan {}",
                case.label
            );
        }
    }
}
