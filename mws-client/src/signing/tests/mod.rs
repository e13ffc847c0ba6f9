use super::*;


const SECRET: &str = "secret-key";
const HOST: &str = "mws.amazonservices.com";
const PATH: &str = "/Orders/2013-09-01";

fn list_orders_params() -> Parameters {
    Parameters::new()
        .with("AWSAccessKeyId", "AKIAEXAMPLE")
        .with("Action", "ListOrders")
        .with("SellerId", "A1SELLER")
        .with("SignatureMethod", "HmacSHA256")
        .with("SignatureVersion", "2")
        .with("Timestamp", "2024-05-01T12:00:00Z")
        .with("Version", "2013-09-01")
        .with("MarketplaceId.Id.1", "ATVPDKIKX0DER")
        .with("CreatedAfter", "2024-04-01T00:00:00Z")
}

#[test]
fn test_string_to_sign_layout() {
    let data = string_to_sign(&list_orders_params(), HOST, PATH, "post");
    assert_eq!(
        data,
        "POST\nmws.amazonservices.com\n/Orders/2013-09-01\n\
         AWSAccessKeyId=AKIAEXAMPLE&Action=ListOrders&CreatedAfter=2024-04-01T00%3A00%3A00Z&\
         MarketplaceId.Id.1=ATVPDKIKX0DER&SellerId=A1SELLER&SignatureMethod=HmacSHA256&\
         SignatureVersion=2&Timestamp=2024-05-01T12%3A00%3A00Z&Version=2013-09-01"
    );
}

#[test]
fn test_sign_hmac_sha256_known_vector() {
    let signature =
        sign(&list_orders_params(), SECRET, HOST, PATH, "POST", SignatureMethod::HmacSha256)
            .unwrap();
    assert_eq!(signature, "wInzFqIZD5fHY99VzkK2E2CVNINfy9Av9IYmWin68vg=");
}

#[test]
fn test_sign_hmac_sha1_known_vector() {
    let signature =
        sign(&list_orders_params(), SECRET, HOST, PATH, "POST", SignatureMethod::HmacSha1)
            .unwrap();
    assert_eq!(signature, "Q8047mPC7vmzlKiv8VXV0xFHzpg=");
}

#[test]
fn test_sign_ignores_stale_signature() {
    let clean = list_orders_params();
    let stale = clean.clone().with(SIGNATURE_PARAM, "previous-signature");

    let a = sign(&clean, SECRET, HOST, PATH, "POST", SignatureMethod::HmacSha256).unwrap();
    let b = sign(&stale, SECRET, HOST, PATH, "POST", SignatureMethod::HmacSha256).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_sign_rejects_empty_secret() {
    let result = sign(&list_orders_params(), "", HOST, PATH, "POST", SignatureMethod::HmacSha256);
    assert!(matches!(result, Err(MwsError::InvalidInput(_))));
}

#[test]
fn test_signature_method_from_str() {
    assert_eq!("HmacSHA1".parse::<SignatureMethod>().unwrap(), SignatureMethod::HmacSha1);
    assert_eq!("HmacSHA256".parse::<SignatureMethod>().unwrap(), SignatureMethod::HmacSha256);
    assert!(matches!(
        "HmacMD5".parse::<SignatureMethod>(),
        Err(MwsError::UnsupportedAlgorithm(name)) if name == "HmacMD5"
    ));
    assert_eq!(SignatureMethod::default().to_string(), "HmacSHA256");
}

#[test]
fn test_percent_encode_rfc3986() {
    assert_eq!(percent_encode("AZaz09-_.~"), "AZaz09-_.~");
    assert_eq!(percent_encode("a b"), "a%20b");
    assert_eq!(percent_encode("a+b=c&d"), "a%2Bb%3Dc%26d");
    assert_eq!(percent_encode("/"), "%2F");
    assert_eq!(percent_encode("é"), "%C3%A9");
}

#[test]
fn test_encode_path() {
    assert_eq!(encode_path(""), "/");
    assert_eq!(encode_path("/"), "/");
    assert_eq!(encode_path("/Orders/2013-09-01"), "/Orders/2013-09-01");
    assert_eq!(encode_path("/a b/c"), "/a%20b/c");
}

#[test]
fn test_parameters_replace_and_order() {
    let mut params = Parameters::new();
    params.insert("b", "1");
    params.insert("a", "2");
    assert_eq!(params.insert("b", "3"), Some("1".to_owned()));

    let keys: Vec<&str> = params.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, ["a", "b"]);
    assert_eq!(params.canonical_query(), "a=2&b=3");
}

#[test]
fn test_parameters_bytewise_order() {
    // Uppercase sorts before lowercase in byte order.
    let params: Parameters = [("action", "x"), ("Zeta", "y"), ("Alpha", "z")].into_iter().collect();
    assert_eq!(params.canonical_query(), "Alpha=z&Zeta=y&action=x");
}

#[test]
fn test_parameters_retain() {
    let mut params = list_orders_params();
    params.retain(|k, _| k.starts_with('S'));
    assert_eq!(params.len(), 3);
    assert!(params.contains("SellerId"));
    assert!(!params.contains("Action"));
}
