/// Bjorklund's algorithm: `pulses` hits spread as evenly as possible over
/// `steps` slots. The layout is built from the remainder tree, so the first
/// hit is not necessarily on slot 0.
pub fn euclidean(pulses: usize, steps: usize) -> Vec<bool> {
    if pulses >= steps {
        return vec![true; steps];
    }
    if pulses == 0 {
        return vec![false; steps];
    }

    let mut counts: Vec<usize> = Vec::new();
    let mut remainders: Vec<usize> = vec![pulses];
    let mut divisor = steps - pulses;
    let mut level = 0;
    while remainders[level] > 1 {
        counts.push(divisor / remainders[level]);
        remainders.push(divisor % remainders[level]);
        divisor = remainders[level];
        level += 1;
    }
    counts.push(divisor);

    let mut pattern = Vec::with_capacity(steps);
    build(level as isize, &counts, &remainders, &mut pattern);
    pattern
}

// -1 emits a rest, -2 a hit.
fn build(level: isize, counts: &[usize], remainders: &[usize], out: &mut Vec<bool>) {
    match level {
        -1 => out.push(false),
        -2 => out.push(true),
        _ => {
            let l = level as usize;
            for _ in 0..counts[l] {
                build(level - 1, counts, remainders, out);
            }
            if remainders[l] != 0 {
                build(level - 2, counts, remainders, out);
            }
        }
    }
}

/// Rotates right, wrapping the tail to the front. Negative offsets rotate left.
pub fn rotate(pattern: &mut [bool], offset: isize) {
    if pattern.is_empty() {
        return;
    }
    let shift = offset.rem_euclid(pattern.len() as isize) as usize;
    pattern.rotate_right(shift);
}
