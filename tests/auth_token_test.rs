use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use school_messaging_service::middleware::auth::{verify_token, Claims};
use uuid::Uuid;

const SECRET: &str = "test-secret";

fn token_for(sub: String, exp: i64) -> String {
    let claims = Claims { sub, exp };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

#[test]
fn accepts_valid_token() {
    let user_id = Uuid::new_v4();
    let token = token_for(user_id.to_string(), Utc::now().timestamp() + 3600);

    let claims = verify_token(&token, SECRET).expect("valid token must verify");
    assert_eq!(claims.sub, user_id.to_string());
}

#[test]
fn rejects_garbage_token() {
    assert!(verify_token("not_a_jwt", SECRET).is_err());
}

#[test]
fn rejects_wrong_secret() {
    let token = token_for(Uuid::new_v4().to_string(), Utc::now().timestamp() + 3600);
    assert!(verify_token(&token, "other-secret").is_err());
}

#[test]
fn rejects_expired_token() {
    let token = token_for(Uuid::new_v4().to_string(), Utc::now().timestamp() - 3600);
    assert!(verify_token(&token, SECRET).is_err());
}
