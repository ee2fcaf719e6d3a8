#![no_main]

use bingo_link::board::validate;
use bingo_link::detector::detect;
use bingo_link::protocol::GridSize;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&size, rest)) = data.split_first() else {
        return;
    };
    let grid = GridSize::new(5 + u32::from(size % 6)).unwrap_or_default();
    let Ok(text) = std::str::from_utf8(rest) else {
        return;
    };
    let cells: Vec<&str> = text.split(',').collect();

    if let Ok(board) = validate(&cells, grid) {
        // An accepted board is a permutation of 1..=n².
        let mut numbers = board.numbers().to_vec();
        numbers.sort_unstable();
        assert!(numbers.iter().copied().eq(1..=grid.max_number()));

        let report = detect(&board, board.numbers());
        assert_eq!(report.line_count, 2 * grid.get() + 2);
    }
});
