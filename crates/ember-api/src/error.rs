//! Maps each subsystem's own error enum onto [`ember_common::error::EmberError`]
//! at the HTTP boundary. `EmberError` itself can't carry `From` impls for
//! these — it lives in `ember-common`, below `ember-vm`/`ember-federation`
//! in the dependency graph — so the conversion happens here instead, the
//! one crate that depends on both sides.

use ember_common::error::EmberError;

pub fn vm_err(e: ember_vm::VmError) -> EmberError {
    use ember_vm::VmError::*;
    match e {
        Invalid(msg) => EmberError::Malformed(msg),
        BadHash(msg) | BadSignature(msg) => EmberError::Cryptographic(msg),
        Exists => EmberError::Malformed("event already exists".into()),
        FetchFailed(msg) => EmberError::TransientRemote(msg),
        Auth(msg) => EmberError::Unauthorized(msg),
        Overloaded(msg) => EmberError::ResourceExhausted(msg),
        Store(err) => EmberError::Internal(anyhow::anyhow!(err)),
        Head(err) => EmberError::Internal(anyhow::anyhow!(err)),
        Federation(err) => federation_err(err),
        Model(err) => EmberError::Malformed(err.to_string()),
        StateRes(msg) => EmberError::Internal(anyhow::anyhow!(msg)),
        CanonicalJson(err) => EmberError::Malformed(err.to_string()),
        Json(err) => EmberError::Malformed(err.to_string()),
        Identifier(msg) => EmberError::Malformed(msg),
        Other(err) => EmberError::Internal(err),
    }
}

pub fn federation_err(e: ember_federation::FederationError) -> EmberError {
    use ember_federation::FederationError::*;
    match e {
        MissingAuthHeader => EmberError::Unauthorized("missing Authorization header".into()),
        MalformedAuthHeader(msg) => EmberError::Unauthorized(msg),
        InvalidSignature => EmberError::Cryptographic("request signature verification failed".into()),
        DiscoveryFailed(server, msg) => EmberError::TransientRemote(format!("{server}: {msg}")),
        Errant(server, until) => {
            EmberError::TransientRemote(format!("{server} is circuit-broken until {until}"))
        }
        RemoteHttp(server, msg) => EmberError::TransientRemote(format!("{server}: {msg}")),
        RemoteProtocol(server, msg) => EmberError::TransientRemote(format!("{server}: {msg}")),
        TransactionTooLarge(msg) => EmberError::Malformed(msg),
        BadWellKnown(server) => EmberError::TransientRemote(format!("{server}: bad well-known response")),
        KeyLoad(msg) => EmberError::Internal(anyhow::anyhow!(msg)),
        Store(err) => EmberError::Internal(anyhow::anyhow!(err)),
        Serialisation(err) => EmberError::Malformed(err.to_string()),
        UrlParse(err) => EmberError::Malformed(err.to_string()),
        CanonicalJson(err) => EmberError::Malformed(err.to_string()),
        Other(err) => EmberError::Internal(err),
    }
}

pub fn http_err(e: ember_http::HttpError) -> EmberError {
    EmberError::Malformed(e.to_string())
}

pub fn store_err(e: ember_store::StoreError) -> EmberError {
    EmberError::Internal(anyhow::anyhow!(e))
}
