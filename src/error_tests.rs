use super::*;

#[test]
fn http_status_mapping() {
    assert_eq!(AppError::user("bad_input", "oops").http_status(), 400);
    assert_eq!(AppError::not_found("not_found", "missing").http_status(), 404);
    assert_eq!(AppError::auth("auth", "no").http_status(), 401);
    assert_eq!(AppError::forbidden("forbidden", "nope").http_status(), 403);
    assert_eq!(AppError::remote("remote_error", "bad gateway").http_status(), 502);
    assert_eq!(AppError::network("network_error", "down").http_status(), 503);
    assert_eq!(AppError::io("io", "io").http_status(), 500);
    assert_eq!(AppError::internal("internal", "panic").http_status(), 500);
}

#[test]
fn from_status_round_trips_known_codes() {
    for s in [400u16, 401, 403, 404, 500, 502] {
        let e = AppError::from_status(s, "profiles");
        let expect = if s >= 500 { 502 } else { s };
        assert_eq!(e.http_status(), expect, "status {}", s);
        assert!(e.message().starts_with("profiles: HTTP"));
    }
}

#[test]
fn exit_codes_group_by_cause() {
    assert_eq!(AppError::user("x", "y").exit_code(), 2);
    assert_eq!(AppError::auth("x", "y").exit_code(), 3);
    assert_eq!(AppError::forbidden("x", "y").exit_code(), 3);
    assert_eq!(AppError::network("x", "y").exit_code(), 4);
    assert_eq!(AppError::io("x", "y").exit_code(), 1);
}

#[test]
fn serde_shape_is_tagged() {
    let e = AppError::auth("unauthorized", "token rejected");
    let v = serde_json::to_value(&e).unwrap();
    assert_eq!(v["type"], "auth");
    assert_eq!(v["code"], "unauthorized");
    assert_eq!(v["message"], "token rejected");
    assert_eq!(e.to_string(), "unauthorized: token rejected");
}

#[test]
fn io_errors_convert() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let e: AppError = io.into();
    assert_eq!(e.code_str(), "io_error");
}
