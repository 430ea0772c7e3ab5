//! Property tests for the lexer, parser and word budget

use kpu::interpreter::{compile, tokenize};
use kpu::runtime::{Processor, ProcessorConfig, SwitchActuator};
use proptest::prelude::*;

const FRAGMENTS: &[&str] = &[
    "ON", "DO", "IF", "THEN", "AND", "OR", "<", ">", "+", "-", "*", "/", "!", "@", ",", ";",
    "true", "false", "gear", "gear.assign", "throttle.increment", "srfHeight", "250", "-1.5",
    "# note",
];

fn script_line() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(FRAGMENTS), 0..12).prop_map(|parts| parts.join(" "))
}

fn valid_line() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "ON < srfHeight 250 DO @ gear.assign true",
        "IF gear THEN @ gear.assign false",
        "ON AND gear ! brakes DO ; @ gear.assign true @ brakes.assign false",
        "IF > + srfHeight 10 * 2 3 THEN @ throttle.increment 5",
        "# comment",
    ])
    .prop_map(str::to_string)
}

proptest! {
    #[test]
    fn lexer_never_panics(text in "\\PC{0,40}") {
        let _ = tokenize(&text);
    }

    #[test]
    fn parser_never_panics(line in script_line()) {
        let _ = compile(&line);
    }

    #[test]
    fn canonical_form_recompiles_identically(line in script_line()) {
        if let Ok(node) = compile(&line) {
            let canonical = node.to_string();
            let again = compile(&canonical).unwrap();
            prop_assert_eq!(again.to_string(), canonical);
        }
    }

    #[test]
    fn word_budget_is_conserved(
        lines in prop::collection::vec(prop_oneof![valid_line(), script_line()], 0..20),
        imem_words in 0usize..48,
        clear_at in prop::option::of(0usize..20),
    ) {
        let config = ProcessorConfig { imem_words, ..ProcessorConfig::default() };
        let mut processor = Processor::new(config);
        processor.add_output(SwitchActuator::new("gear"));

        for (index, line) in lines.iter().enumerate() {
            if clear_at == Some(index) {
                processor.clear_instructions();
                prop_assert_eq!(processor.program().remaining_words(), imem_words);
            }
            let before = processor.save();
            let remaining = processor.program().remaining_words();
            match processor.add_instruction(line) {
                Ok(()) => {
                    let added = processor.program().instructions().last().unwrap();
                    prop_assert_eq!(remaining - added.words(), processor.program().remaining_words());
                }
                Err(_) => {
                    prop_assert_eq!(processor.save(), before);
                    prop_assert_eq!(processor.program().remaining_words(), remaining);
                }
            }

            let used: usize = processor.program().instructions().iter().map(|i| i.words()).sum();
            prop_assert_eq!(used + processor.program().remaining_words(), imem_words);
            processor.tick();
        }
    }
}
