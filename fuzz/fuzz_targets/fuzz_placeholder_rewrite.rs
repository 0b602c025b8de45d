#![no_main]

use libfuzzer_sys::arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use scopedb::query::{rewrite, Placeholder};

#[derive(Debug)]
struct RewriteInput {
    sql: String,
    style: Placeholder,
}

impl<'a> Arbitrary<'a> for RewriteInput {
    fn arbitrary(u: &mut Unstructured<'a>) -> libfuzzer_sys::arbitrary::Result<Self> {
        let sql: String = u.arbitrary()?;
        let style = match u.int_in_range(0..=2u8)? {
            0 => Placeholder::QuestionMark,
            1 => Placeholder::Format,
            _ => Placeholder::Numbered,
        };
        Ok(Self { sql, style })
    }
}

fuzz_target!(|input: RewriteInput| {
    let rewritten = rewrite(&input.sql, input.style);

    // Placeholder count does not depend on the target style
    let counted = rewrite(&input.sql, Placeholder::QuestionMark);
    assert_eq!(rewritten.placeholders, counted.placeholders);
    assert_eq!(counted.sql, input.sql);

    if input.style == Placeholder::Format {
        assert!(rewritten.sql.len() >= input.sql.len());
    }
});
