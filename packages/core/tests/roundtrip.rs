//! Full-pipeline round trips: a domain value through encode, document
//! form, and decode back to structural equality.

use std::sync::Arc;

use docmap_core::{
    CodecContext, CodecRegistry, DataCodec, DataValue, DecodeInput, Document, DocumentInput,
    EncodeOutput, EnumCodec, Query, Result, TypeDesc, ValueCodec,
};

#[derive(Debug, Clone, PartialEq)]
enum Rank {
    Bronze,
    Gold,
}

#[derive(Debug, Clone, PartialEq)]
struct Profile {
    name: String,
    score: i64,
    rank: Rank,
    tags: Vec<String>,
    ratings: Vec<(i64, i64)>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: String::new(),
            score: 0,
            rank: Rank::Bronze,
            tags: Vec::new(),
            ratings: Vec::new(),
        }
    }
}

struct ProfileCodec;

const RANK: &str = "demo.Rank";

impl ValueCodec<Profile> for ProfileCodec {
    fn type_name(&self) -> &str {
        "demo.Profile"
    }

    fn construct(&self, _ctx: &CodecContext, _input: &dyn DecodeInput) -> Result<Profile> {
        Ok(Profile::default())
    }

    fn decode(
        &self,
        ctx: &CodecContext,
        value: &mut Profile,
        input: &dyn DecodeInput,
    ) -> Result<()> {
        value.name = input.read(ctx, "name", &TypeDesc::String)?.into_string()?;
        value.score = input.read(ctx, "score", &TypeDesc::Int64)?.to_i64()?;
        value.rank = input.read(ctx, "rank", &TypeDesc::named(RANK))?.downcast()?;
        value.tags = input
            .read(ctx, "tags", &TypeDesc::list(TypeDesc::String))?
            .into_list()?
            .into_iter()
            .map(|v| v.into_string())
            .collect::<Result<_>>()?;
        value.ratings = input
            .read(ctx, "ratings", &TypeDesc::map(TypeDesc::Int64, TypeDesc::Int64))?
            .into_map()?
            .into_iter()
            .map(|(k, v)| Ok((k.to_i64()?, v.to_i64()?)))
            .collect::<Result<_>>()?;
        Ok(())
    }

    fn encode(
        &self,
        ctx: &CodecContext,
        value: &Profile,
        output: &mut EncodeOutput,
    ) -> Result<()> {
        output.write(
            ctx,
            "name",
            &DataValue::String(value.name.clone()),
            &TypeDesc::String,
        )?;
        output.write(ctx, "score", &DataValue::Int(value.score), &TypeDesc::Int64)?;
        output.write(
            ctx,
            "rank",
            &DataValue::Object(docmap_core::ObjectValue::new(RANK, value.rank.clone())),
            &TypeDesc::named(RANK),
        )?;
        output.write(
            ctx,
            "tags",
            &DataValue::List(
                value
                    .tags
                    .iter()
                    .map(|t| DataValue::String(t.clone()))
                    .collect(),
            ),
            &TypeDesc::list(TypeDesc::String),
        )?;
        output.write(
            ctx,
            "ratings",
            &DataValue::Map(
                value
                    .ratings
                    .iter()
                    .map(|(k, v)| (DataValue::Int(*k), DataValue::Int(*v)))
                    .collect(),
            ),
            &TypeDesc::map(TypeDesc::Int64, TypeDesc::Int64),
        )?;
        Ok(())
    }
}

impl DataCodec<i64, Profile> for ProfileCodec {
    fn primary_key_field(&self) -> &str {
        "id"
    }

    fn create_default(&self, _key: &i64) -> Profile {
        Profile::default()
    }
}

fn context() -> CodecContext {
    let mut registry = CodecRegistry::new();
    registry.register(ProfileCodec);
    registry.register_enum(EnumCodec::new(
        RANK,
        [("Bronze", Rank::Bronze), ("Gold", Rank::Gold)],
    ));
    CodecContext::new(Arc::new(registry))
}

fn sample() -> Profile {
    Profile {
        name: "Alice".into(),
        score: 90,
        rank: Rank::Gold,
        tags: vec!["admin".into(), "beta".into()],
        ratings: vec![(1, 10), (2, 20)],
    }
}

fn encode_profile(ctx: &CodecContext, profile: &Profile, key: i64) -> Document {
    let mut output = EncodeOutput::new();
    output.set_key(ctx, "id", &DataValue::Int(key)).unwrap();
    ProfileCodec.encode(ctx, profile, &mut output).unwrap();
    output.finish()
}

#[test]
fn decode_of_encode_is_identity() {
    let ctx = context();
    let original = sample();

    let document = encode_profile(&ctx, &original, 9);
    let input = DocumentInput::new(document);

    let entry = ctx.registry().find::<Profile>().unwrap();
    let decoded = entry.construct_and_decode(&ctx, &input).unwrap();
    let decoded: Profile = decoded.into_inner().unwrap();

    assert_eq!(decoded, original);
}

#[test]
fn encoded_document_has_expected_shape() {
    let ctx = context();
    let document = encode_profile(&ctx, &sample(), 9);

    assert_eq!(document.field("id"), Some(&Document::Int64(9)));
    assert_eq!(document.field("rank"), Some(&Document::from("Gold")));
    // non-string map keys flatten to pairs
    let ratings = document.field("ratings").unwrap().as_array().unwrap();
    assert_eq!(
        ratings[0],
        Document::Array(vec![Document::from("1"), Document::Int64(10)])
    );
}

#[test]
fn key_reads_back_from_encoded_document() {
    let ctx = context();
    let document = encode_profile(&ctx, &sample(), 42);
    let input = DocumentInput::new(document);

    let key = input.read_key("id", &TypeDesc::Int64).unwrap();
    assert_eq!(key, DataValue::Int(42));
}

#[test]
fn default_query_comparator_checks_encoded_fields() {
    let ctx = context();
    let codec = ProfileCodec;

    let query = Query::all().and_eq("name", "Alice");
    let matches = codec.query_comparator(ctx.clone(), &query);

    let alice = sample();
    let bob = Profile {
        name: "Bob".into(),
        ..sample()
    };

    assert!(matches(&alice));
    assert!(!matches(&bob));
}

#[test]
fn absent_container_fields_decode_empty() {
    let ctx = context();
    // a document missing tags and ratings entirely
    let document: Document = [
        ("id".to_string(), Document::Int64(1)),
        ("name".to_string(), Document::from("Sparse")),
        ("score".to_string(), Document::Int64(0)),
        ("rank".to_string(), Document::from("bronze")),
    ]
    .into_iter()
    .collect();

    let entry = ctx.registry().find::<Profile>().unwrap();
    let decoded = entry
        .construct_and_decode(&ctx, &DocumentInput::new(document))
        .unwrap();
    let profile: Profile = decoded.into_inner().unwrap();

    assert!(profile.tags.is_empty());
    assert!(profile.ratings.is_empty());
    assert_eq!(profile.rank, Rank::Bronze);
}
