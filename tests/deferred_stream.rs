//! §8 scenario 5: deferred stream. A subschema supporting `@defer` returns an
//! initial payload (`{ name: "Ada" }`) followed by a later patch (`{ age: 42
//! }`) for the same object. A resolver that asks for `age` *after* the
//! initial payload but *before* the patch has arrived must still receive it,
//! once the receiver pumps the stream forward to satisfy the request.

use futures::stream;

use graphql_stitch::error::PathSegment;
use graphql_stitch::receiver::Receiver;
use graphql_stitch::subschema::Patch;

use crate::common::jstr;

fn patches() -> Vec<Patch> {
    vec![
        Patch {
            data: Some(crate::common::jobj(vec![("name", jstr("Ada"))])),
            path: Vec::new(),
            label: None,
            errors: Vec::new(),
            has_next: true,
        },
        Patch {
            data: Some(crate::common::jobj(vec![("age", serde_json_bytes::Value::from(42i64))])),
            path: Vec::new(),
            label: None,
            errors: Vec::new(),
            has_next: false,
        },
    ]
}

#[tokio::test]
async fn resolver_waiting_past_the_initial_payload_still_receives_the_deferred_patch() {
    let mut receiver = Receiver::new(Box::pin(stream::iter(patches())), 0);

    let (initial, _) = receiver.initial_result().await;
    assert_eq!(initial.data, Some(crate::common::jobj(vec![("name", jstr("Ada"))])));

    let value = receiver
        .request(vec![PathSegment::Field("age".to_owned())])
        .await
        .expect("the deferred patch for `age` should eventually arrive");
    assert_eq!(value, serde_json_bytes::Value::from(42i64));
}

#[tokio::test]
async fn a_field_that_already_arrived_resolves_immediately_without_pumping_again() {
    let mut receiver = Receiver::new(Box::pin(stream::iter(patches())), 0);
    let (_, _) = receiver.initial_result().await;

    // Drain the deferred patch once.
    let first = receiver.request(vec![PathSegment::Field("age".to_owned())]).await;
    assert_eq!(first, Some(serde_json_bytes::Value::from(42i64)));

    // A second, independent request for the same field must still see it,
    // without needing the (by-now-exhausted) stream to produce anything else.
    let second = receiver.request(vec![PathSegment::Field("age".to_owned())]).await;
    assert_eq!(second, Some(serde_json_bytes::Value::from(42i64)));
}
