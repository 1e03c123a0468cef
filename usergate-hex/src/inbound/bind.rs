//! Request binders: populate a [`Record`] from a JSON body, a multipart
//! form or the query string, then validate it.

use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Multipart, Query, Request},
    http::{HeaderMap, header, request::Parts},
};

use usergate_types::AppError;
use usergate_types::binding::{BindError, BindingPlan, Record, Source, SourceValue, UploadedFile, assign, validate};

use super::respond::ApiError;

/// Upper bound for a multipart body, enforced by the router's body limit.
pub const MAX_MULTIPART_BYTES: usize = 20 << 20;

/// A record bound from `application/json` or `multipart/form-data`.
///
/// JSON bodies are strict: every key must name a `json`-tagged field.
/// Multipart text parts bind by `form` tag and file parts by `file` tag;
/// the first non-empty value for a key wins and unknown parts are ignored.
/// A file part with an empty filename or body means no file was chosen.
/// Any other content type is rejected with `415`.
#[derive(Debug)]
pub struct Bound<T>(pub T);

/// A record bound from the URL query string by `query` tag.
///
/// Absent or empty parameters keep the record's defaults.
#[derive(Debug)]
pub struct BoundQuery<T>(pub T);

impl<S, T> FromRequest<S> for Bound<T>
where
    S: Send + Sync,
    T: Record,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let record = match media_type(req.headers()).as_deref() {
            Some("application/json") => bind_json::<T, S>(req, state).await?,
            Some("multipart/form-data") => bind_multipart::<T, S>(req, state).await?,
            other => {
                return Err(AppError::UnsupportedMediaType(other.unwrap_or_default().to_string()).into());
            }
        };

        validate(&record).map_err(AppError::from)?;
        Ok(Bound(record))
    }
}

impl<S, T> FromRequestParts<S> for BoundQuery<T>
where
    S: Send + Sync,
    T: Record,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
            .map_err(|_| AppError::BadRequest("invalid query string".into()))?;

        let mut record = T::default();
        let mut seen = vec![false; T::FIELDS.len()];
        for (key, value) in pairs {
            if value.is_empty() {
                continue;
            }
            if let Some(index) = field_for::<T>(Source::Query, &key) {
                if !seen[index] {
                    seen[index] = true;
                    assign(&mut record, index, SourceValue::Str(value)).map_err(AppError::from)?;
                }
            }
        }

        validate(&record).map_err(AppError::from)?;
        Ok(BoundQuery(record))
    }
}

/// The lowercased media type of `Content-Type`, parameters stripped.
fn media_type(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let media = value.split(';').next()?.trim().to_ascii_lowercase();
    (!media.is_empty()).then_some(media)
}

fn field_for<T: Record>(source: Source, key: &str) -> Option<usize> {
    T::FIELDS.iter().position(|field| field.tag(source) == Some(key))
}

async fn bind_json<T: Record, S: Send + Sync>(req: Request, state: &S) -> Result<T, AppError> {
    let body = Bytes::from_request(req, state)
        .await
        .map_err(|_| AppError::BadRequest("invalid json body".into()))?;
    let value: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|_| AppError::BadRequest("invalid json body".into()))?;
    let serde_json::Value::Object(object) = value else {
        return Err(BindError::NotAnObject.into());
    };

    let (keys, values): (Vec<String>, Vec<serde_json::Value>) = object.into_iter().unzip();

    // Built per request: key sets are client-controlled and never cached.
    let plan = BindingPlan::build::<T, _>(Source::Json, &keys);
    if let Some(position) = plan.unmatched().next() {
        return Err(BindError::UnknownField(keys[position].clone()).into());
    }

    let values = values
        .into_iter()
        .enumerate()
        .map(|(position, value)| {
            SourceValue::from_json(value).ok_or_else(|| {
                let index = plan.target(position).unwrap_or_default();
                BindError::Invalid {
                    field: T::FIELDS[index].name,
                }
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut record = T::default();
    plan.apply(&mut record, values)?;
    Ok(record)
}

async fn bind_multipart<T: Record, S: Send + Sync>(req: Request, state: &S) -> Result<T, AppError> {
    let mut multipart = Multipart::from_request(req, state)
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {}", e.body_text())))?;

    let mut record = T::default();
    let mut seen = vec![false; T::FIELDS.len()];

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {}", e.body_text())))?
    {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        if let Some(file_name) = field.file_name().map(str::to_owned) {
            let Some(index) = field_for::<T>(Source::File, &name) else {
                continue;
            };
            if seen[index] || file_name.is_empty() {
                continue;
            }
            let content_type = field.content_type().map(str::to_owned);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {}", e.body_text())))?;
            if bytes.is_empty() {
                continue;
            }
            seen[index] = true;
            let file = UploadedFile {
                file_name,
                content_type,
                bytes,
            };
            assign(&mut record, index, SourceValue::File(file))?;
        } else {
            let Some(index) = field_for::<T>(Source::Form, &name) else {
                continue;
            };
            let text = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {}", e.body_text())))?;
            if text.is_empty() || seen[index] {
                continue;
            }
            seen[index] = true;
            assign(&mut record, index, SourceValue::Str(text))?;
        }
    }

    Ok(record)
}
