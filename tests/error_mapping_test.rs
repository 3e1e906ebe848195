use school_messaging_service::error::AppError;
use school_messaging_service::middleware::error_handling::map_error;

#[test]
fn validation_maps_to_400() {
    let (status, body) = map_error(&AppError::Validation("content or file required".into()));
    assert_eq!(status.as_u16(), 400);
    assert_eq!(body.error, "validation_failed");
}

#[test]
fn unauthorized_maps_to_401() {
    let (status, body) = map_error(&AppError::Unauthorized);
    assert_eq!(status.as_u16(), 401);
    assert_eq!(body.error, "unauthorized");
}

#[test]
fn forbidden_maps_to_403() {
    let (status, body) = map_error(&AppError::Forbidden("only the sender can edit".into()));
    assert_eq!(status.as_u16(), 403);
    assert_eq!(body.error, "authorization_denied");
    assert!(body.message.contains("only the sender can edit"));
}

#[test]
fn not_found_maps_to_404_with_subject() {
    let (status, body) = map_error(&AppError::NotFound("conversation"));
    assert_eq!(status.as_u16(), 404);
    assert_eq!(body.error, "not_found");
    assert_eq!(body.message, "conversation not found");
}

#[test]
fn store_failure_maps_to_500_without_detail() {
    let (status, body) = map_error(&AppError::Database(sqlx::Error::PoolClosed));
    assert_eq!(status.as_u16(), 500);
    assert_eq!(body.error, "store_failure");
    // internal detail must not leak to clients
    assert_eq!(body.message, "backing store unavailable");
}

#[test]
fn config_error_maps_to_500() {
    let (status, _) = map_error(&AppError::Config("DATABASE_URL missing".into()));
    assert_eq!(status.as_u16(), 500);
}
