use std::sync::Arc;
use std::thread;

use sentiforge_core::text::UNK_ID;
use sentiforge_core::{Pipeline, PipelineConfig, SentiError, Table, Tokenizer};

const REVIEWS: &str = "\
id,review,sentiment
1,\"Great movie!! 10/10\",pos
2,\"Awful. Just awful.\",neg
3,\"Loved every minute, great cast\",pos
4,\"Boring plot and boring dialogue\",neg
5,\"A great, great film<br />Must see\",pos
6,\"Not worth the ticket\",neg
7,\"Great soundtrack\",pos
8,\"Dull\",neg
9,\"!!!\",pos
10,\"Worst film of the year\",neg
";

fn table() -> Table {
    Table::from_csv_reader(REVIEWS.as_bytes()).unwrap()
}

fn config() -> PipelineConfig {
    PipelineConfig::new("review", "sentiment")
        .with_split_ratio(0.5)
        .with_batch_size(2)
        .with_vocab_size(8)
        .with_num_oov_buckets(1)
}

#[test]
fn ten_rows_split_in_half() {
    let ctx = Pipeline::run(&table(), &config()).unwrap();
    assert_eq!(ctx.train().len(), 5);
    assert_eq!(ctx.test().len(), 5);

    let texts: Vec<&str> = ctx
        .train()
        .iter()
        .chain(ctx.test().iter())
        .map(|r| r.text.as_str())
        .collect();
    assert_eq!(texts[0], "Great movie!! 10/10");
    assert_eq!(texts[9], "Worst film of the year");
}

#[test]
fn first_seen_label_is_zero() {
    let ctx = Pipeline::run(&table(), &config()).unwrap();
    assert_eq!(ctx.labels().encode("pos"), Some(0));
    assert_eq!(ctx.labels().encode("neg"), Some(1));
    let labels: Vec<u8> = ctx.train().iter().map(|r| r.label).collect();
    assert_eq!(labels, vec![0, 1, 0, 1, 0]);
}

#[test]
fn tokenizer_scenario() {
    assert_eq!(
        Tokenizer::new().tokenize("Great movie!! 10/10"),
        vec!["great", "movie", "1010"]
    );
}

#[test]
fn encoding_preserves_counts_and_handles_empty_text() {
    let ctx = Pipeline::run(&table(), &config()).unwrap();

    let train: Vec<_> = ctx.encoded_train().collect();
    let test: Vec<_> = ctx.encoded_test().collect();
    assert_eq!(train.iter().map(|b| b.len()).sum::<usize>(), 5);
    assert_eq!(test.iter().map(|b| b.len()).sum::<usize>(), 5);
    assert_eq!(train.iter().map(|b| b.len()).collect::<Vec<_>>(), vec![2, 2, 1]);

    // Row 9 ("!!!") normalizes to nothing.
    let empty = &test[1].sequences[1];
    assert!(empty.is_empty());
}

#[test]
fn vocabulary_respects_size() {
    let ctx = Pipeline::run(&table(), &config()).unwrap();
    assert!(ctx.vocabulary().len() <= 8);
    assert_eq!(ctx.vocabulary().len(), 8);
    assert_eq!(ctx.vocabulary().words().next(), Some("great"));
}

#[test]
fn single_bucket_unknowns_collapse() {
    let ctx = Pipeline::run(&table(), &config()).unwrap();
    for word in ["xylophone", "quantum", "zebra"] {
        assert_eq!(ctx.table().lookup(word), UNK_ID);
    }
}

#[test]
fn identical_inputs_give_identical_tables() {
    let a = Pipeline::run(&table(), &config()).unwrap();
    let b = Pipeline::run(&table(), &config()).unwrap();
    assert_eq!(a.table(), b.table());
}

#[test]
fn table_is_shared_across_threads() {
    let ctx = Pipeline::run(&table(), &config()).unwrap();
    let expected = ctx.encode_text("great soundtrack, unknown word");

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let table = Arc::clone(ctx.table());
            thread::spawn(move || {
                table.lookup_all(&Tokenizer::new().tokenize("great soundtrack, unknown word"))
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn missing_column_is_reported() {
    let err = Pipeline::run(&table(), &PipelineConfig::new("text", "sentiment")).unwrap_err();
    assert!(matches!(err, SentiError::MissingColumn { .. }));
}

#[test]
fn tiny_train_split_is_legal() {
    let csv = "review,sentiment\nonly row,pos\nsecond,neg\n";
    let table = Table::from_csv_reader(csv.as_bytes()).unwrap();
    let ctx = Pipeline::run(&table, &config().with_split_ratio(0.2)).unwrap();
    assert!(ctx.train().is_empty());
    assert!(ctx.vocabulary().is_empty());
    assert_eq!(ctx.encoded_train().count(), 0);
    assert_eq!(ctx.encoded_test().map(|b| b.len()).sum::<usize>(), 2);
}
