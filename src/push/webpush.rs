use aes_gcm::aead::{rand_core::RngCore, Aead, OsRng};
use aes_gcm::{Aes128Gcm, KeyInit, Nonce};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use hkdf::Hkdf;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use p256::ecdh::diffie_hellman;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::EncodePrivateKey;
use p256::{PublicKey, SecretKey};
use reqwest::{header, Client};
use serde::Serialize;
use sha2::Sha256;
use url::Url;

use super::{PushError, PushTransport};
use crate::config::PushConfig;
use crate::models::PushSubscription;

const RECORD_SIZE: u32 = 4096;
const TAG_LEN: usize = 16;
const VAPID_LIFETIME_SECS: i64 = 12 * 60 * 60;

pub(crate) fn decode_key(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(value.trim().trim_end_matches('='))
}

#[derive(Serialize)]
struct VapidClaims<'a> {
    aud: String,
    exp: i64,
    sub: &'a str,
}

#[derive(Clone)]
pub struct VapidKeys {
    encoding: EncodingKey,
    public_key: String,
}

impl VapidKeys {
    pub fn from_base64(private_key: &str) -> Result<Self, PushError> {
        let raw = decode_key(private_key)
            .map_err(|err| PushError::InvalidVapidKey(err.to_string()))?;
        let secret = SecretKey::from_slice(&raw)
            .map_err(|_| PushError::InvalidVapidKey("expected a P-256 private key".into()))?;
        let der = secret
            .to_pkcs8_der()
            .map_err(|err| PushError::InvalidVapidKey(err.to_string()))?;
        let public_key = URL_SAFE_NO_PAD.encode(secret.public_key().to_encoded_point(false));

        Ok(Self {
            encoding: EncodingKey::from_ec_der(der.as_bytes()),
            public_key,
        })
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn authorization(&self, endpoint: &Url, subject: &str, now: i64) -> Result<String, PushError> {
        let claims = VapidClaims {
            aud: endpoint.origin().ascii_serialization(),
            exp: now + VAPID_LIFETIME_SECS,
            sub: subject,
        };
        let token = encode(&Header::new(Algorithm::ES256), &claims, &self.encoding)?;
        Ok(format!("vapid t={token}, k={}", self.public_key))
    }
}

fn content_keys(
    shared_secret: &[u8],
    auth_secret: &[u8],
    ua_public: &[u8],
    as_public: &[u8],
    salt: &[u8],
) -> Result<([u8; 16], [u8; 12]), PushError> {
    let mut key_info = Vec::with_capacity(14 + ua_public.len() + as_public.len());
    key_info.extend_from_slice(b"WebPush: info\0");
    key_info.extend_from_slice(ua_public);
    key_info.extend_from_slice(as_public);

    let mut ikm = [0u8; 32];
    Hkdf::<Sha256>::new(Some(auth_secret), shared_secret)
        .expand(&key_info, &mut ikm)
        .map_err(|_| PushError::Encryption)?;

    let prk = Hkdf::<Sha256>::new(Some(salt), &ikm);
    let mut cek = [0u8; 16];
    prk.expand(b"Content-Encoding: aes128gcm\0", &mut cek)
        .map_err(|_| PushError::Encryption)?;
    let mut nonce = [0u8; 12];
    prk.expand(b"Content-Encoding: nonce\0", &mut nonce)
        .map_err(|_| PushError::Encryption)?;
    Ok((cek, nonce))
}

pub(crate) fn encrypt_payload(
    payload: &[u8],
    ua_public: &[u8],
    auth_secret: &[u8],
    sender: &SecretKey,
    salt: [u8; 16],
) -> Result<Vec<u8>, PushError> {
    if payload.len() + 1 + TAG_LEN > RECORD_SIZE as usize {
        return Err(PushError::PayloadTooLarge(payload.len()));
    }

    let ua_key = PublicKey::from_sec1_bytes(ua_public)
        .map_err(|_| PushError::InvalidSubscription("p256dh is not a P-256 point".into()))?;
    let ua_point = ua_key.to_encoded_point(false);
    let as_point = sender.public_key().to_encoded_point(false);
    let shared = diffie_hellman(sender.to_nonzero_scalar(), ua_key.as_affine());

    let (cek, nonce) = content_keys(
        shared.raw_secret_bytes().as_slice(),
        auth_secret,
        ua_point.as_bytes(),
        as_point.as_bytes(),
        &salt,
    )?;

    let mut plaintext = Vec::with_capacity(payload.len() + 1);
    plaintext.extend_from_slice(payload);
    plaintext.push(0x02);

    let cipher = Aes128Gcm::new_from_slice(&cek).map_err(|_| PushError::Encryption)?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
        .map_err(|_| PushError::Encryption)?;

    let key_id = as_point.as_bytes();
    let mut body = Vec::with_capacity(16 + 4 + 1 + key_id.len() + ciphertext.len());
    body.extend_from_slice(&salt);
    body.extend_from_slice(&RECORD_SIZE.to_be_bytes());
    body.push(key_id.len() as u8);
    body.extend_from_slice(key_id);
    body.extend_from_slice(&ciphertext);
    Ok(body)
}

#[derive(Clone)]
pub struct WebPushTransport {
    client: Client,
    vapid: VapidKeys,
    subject: String,
    ttl_seconds: u32,
}

impl WebPushTransport {
    pub fn new(client: Client, vapid: VapidKeys, subject: impl Into<String>, ttl_seconds: u32) -> Self {
        Self {
            client,
            vapid,
            subject: subject.into(),
            ttl_seconds,
        }
    }

    pub fn from_config(client: Client, config: &PushConfig) -> Result<Option<Self>, PushError> {
        let Some(private_key) = config.vapid_private_key.as_deref() else {
            return Ok(None);
        };
        let vapid = VapidKeys::from_base64(private_key)?;
        Ok(Some(Self::new(
            client,
            vapid,
            config.vapid_subject.clone(),
            config.ttl_seconds,
        )))
    }

    pub fn public_key(&self) -> &str {
        self.vapid.public_key()
    }
}

#[async_trait]
impl PushTransport for WebPushTransport {
    async fn send(&self, subscription: &PushSubscription, payload: &[u8]) -> Result<u16, PushError> {
        let endpoint = Url::parse(&subscription.endpoint)?;
        let ua_public = decode_key(&subscription.p256dh)
            .map_err(|err| PushError::InvalidSubscription(format!("p256dh: {err}")))?;
        let auth_secret = decode_key(&subscription.auth)
            .map_err(|err| PushError::InvalidSubscription(format!("auth: {err}")))?;

        let body = {
            let sender = SecretKey::random(&mut OsRng);
            let mut salt = [0u8; 16];
            OsRng.fill_bytes(&mut salt);
            encrypt_payload(payload, &ua_public, &auth_secret, &sender, salt)?
        };
        let authorization =
            self.vapid
                .authorization(&endpoint, &self.subject, Utc::now().timestamp())?;

        let response = self
            .client
            .post(endpoint)
            .header(header::AUTHORIZATION, authorization)
            .header(header::CONTENT_ENCODING, "aes128gcm")
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .header("TTL", self.ttl_seconds.to_string())
            .body(body)
            .send()
            .await?;
        Ok(response.status().as_u16())
    }
}
