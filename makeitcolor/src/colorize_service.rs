use std::{
    collections::HashMap,
    convert::Infallible,
    io,
    path::{Path, PathBuf},
    sync::Arc,
    task::{Context, Poll},
};

use colorizers::{
    expand, ChannelOrder, Colorizer, CommandColorizer, ConversionWorkflow, InputContract, LazyColorizer,
    ModelStore, OutputArtifact,
};
use futures::future::BoxFuture;
use hyper::{body::HttpBody, header, service::Service, Body, Method, Request, Response, StatusCode};
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::errors::{Result, ServiceError};

const INDEX_HTML: &str = include_str!("index.html");

pub type Workflow = ConversionWorkflow<Box<dyn Colorizer>>;

/// What `POST /colorize` answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// The colorized image, as a download.
    Colorized,
    /// Original and colorized image next to each other.
    SideBySide,
}

impl Layout {
    fn from_query(params: &HashMap<String, String>) -> Result<Layout> {
        match params.get("layout").map(String::as_str) {
            None | Some("colorized") => Ok(Layout::Colorized),
            Some("side_by_side") => Ok(Layout::SideBySide),
            Some(other) => Err(ServiceError::InvalidParam {
                param: "layout",
                value: other.to_owned(),
            }),
        }
    }
}

/// HTTP front end of the conversion workflow.
#[derive(Clone)]
pub struct ColorizeService {
    workflow: Arc<Workflow>,
    max_upload_bytes: usize,
    samples_dir: Option<PathBuf>,
}

impl ColorizeService {
    pub fn new(workflow: Workflow, max_upload_bytes: usize) -> Self {
        ColorizeService {
            workflow: Arc::new(workflow),
            max_upload_bytes,
            samples_dir: None,
        }
    }

    /// Offers the JPEG and PNG files in `dir` as sample inputs on the upload page.
    pub fn with_samples(mut self, dir: impl Into<PathBuf>) -> Self {
        self.samples_dir = Some(dir.into());
        self
    }

    /// Wires the process-wide pipeline: model weights are provisioned and the
    /// inference command prepared on the first request, then reused.
    pub fn from_settings(settings: &Settings) -> Self {
        let contract: InputContract = settings.pipeline.input.into();
        let store = ModelStore::new(settings.model.id.clone(), settings.model.dir.clone())
            .with_fetch_command(settings.model.fetch_command.clone());
        let command = settings.pipeline.command.clone();
        let order: Option<ChannelOrder> = settings.pipeline.output_order.map(Into::into);
        let work_dir = settings.work_dir.clone();

        let pipeline = LazyColorizer::new(contract, move || {
            let model_dir = store.ensure()?.to_string_lossy().into_owned();
            let argv = expand(&command, &[("model_dir", model_dir.as_str())]);
            let mut colorizer = CommandColorizer::new(argv, contract, work_dir.clone())?;
            if let Some(order) = order {
                colorizer = colorizer.with_output_order(order);
            }
            Ok(Box::new(colorizer) as Box<dyn Colorizer>)
        });

        let workflow = ConversionWorkflow::new(Box::new(pipeline) as Box<dyn Colorizer>, settings.work_dir.clone())
            .with_naming(settings.naming());
        let service = ColorizeService::new(workflow, settings.max_upload_bytes);
        match &settings.samples_dir {
            Some(dir) => service.with_samples(dir.clone()),
            None => service,
        }
    }

    async fn route(self, req: Request<Body>) -> Result<Response<Body>> {
        let method = req.method().clone();
        let path = req.uri().path().to_owned();
        match (method, path.as_str()) {
            (Method::GET, "/") => Ok(html(INDEX_HTML)),
            (Method::GET, "/health") => Ok(Response::new(Body::from("ok"))),
            (Method::POST, "/colorize") => self.colorize(req).await,
            (Method::GET, "/samples") => self.list_samples().await,
            (Method::GET, p) if p.starts_with("/samples/") => self.sample(&p["/samples/".len()..]).await,
            (_, "/") | (_, "/health") | (_, "/colorize") | (_, "/samples") => Err(ServiceError::MethodNotAllowed),
            (_, p) if p.starts_with("/samples/") => Err(ServiceError::MethodNotAllowed),
            _ => Err(ServiceError::NotFound(path.clone())),
        }
    }

    async fn colorize(self, req: Request<Body>) -> Result<Response<Body>> {
        // parse the query parameters (e.g. `layout=side_by_side`)
        let query = req.uri().query().unwrap_or("");
        let params: HashMap<String, String> = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        let layout = Layout::from_query(&params)?;

        let upload = read_body(req.into_body(), self.max_upload_bytes).await?;
        info!(bytes = upload.len(), ?layout, "received upload");

        // the workflow blocks on the collaborator, keep it off the reactor
        let workflow = self.workflow.clone();
        let conversion = tokio::task::spawn_blocking(move || workflow.run(&upload)).await??;

        let artifact = match layout {
            Layout::Colorized => conversion.artifact,
            Layout::SideBySide => conversion.side_by_side()?,
        };
        Ok(png_response(artifact, layout, &conversion.request_id.to_string()))
    }

    /// JSON list of the sample file names, empty when none are configured.
    async fn list_samples(&self) -> Result<Response<Body>> {
        let mut names = Vec::new();
        if let Some(dir) = &self.samples_dir {
            let mut entries = match tokio::fs::read_dir(dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    warn!(dir = ?dir, "samples directory does not exist");
                    return Ok(json(&names));
                }
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                if sample_mime(&name).is_some() && entry.file_type().await?.is_file() {
                    names.push(name);
                }
            }
        }
        names.sort();
        Ok(json(&names))
    }

    async fn sample(&self, name: &str) -> Result<Response<Body>> {
        let not_found = || ServiceError::NotFound(format!("/samples/{}", name));
        let dir = self.samples_dir.as_deref().ok_or_else(not_found)?;
        let mime = sample_mime(name).ok_or_else(not_found)?;
        if name.starts_with('.') || name.contains(['/', '\\']) {
            return Err(not_found());
        }

        let bytes = match tokio::fs::read(dir.join(name)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };
        let mut response = Response::new(Body::from(bytes));
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, header::HeaderValue::from_static(mime));
        Ok(response)
    }
}

fn sample_mime(name: &str) -> Option<&'static str> {
    let extension = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        _ => None,
    }
}

impl Service<Request<Body>> for ColorizeService {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<'static, std::result::Result<Response<Body>, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Infallible>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let service = self.clone();
        let method = req.method().clone();
        let path = req.uri().path().to_owned();
        Box::pin(async move {
            let response = service.route(req).await.unwrap_or_else(|e| {
                if e.status().is_server_error() {
                    error!(%method, %path, error = %e, "request failed");
                } else {
                    warn!(%method, %path, error = %e, "request rejected");
                }
                e.to_response()
            });
            Ok(response)
        })
    }
}

/// Collects the request body, refusing anything above `limit` bytes.
async fn read_body(mut body: Body, limit: usize) -> Result<Vec<u8>> {
    if let Some(announced) = body.size_hint().exact() {
        if announced as usize > limit {
            return Err(ServiceError::PayloadTooLarge { limit });
        }
    }

    let mut buffer = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk?;
        if buffer.len() + chunk.len() > limit {
            return Err(ServiceError::PayloadTooLarge { limit });
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer)
}

fn png_response(artifact: OutputArtifact, layout: Layout, request_id: &str) -> Response<Body> {
    let disposition = match layout {
        Layout::Colorized => format!("attachment; filename=\"{}\"", artifact.file_name),
        Layout::SideBySide => format!("inline; filename=\"{}\"", artifact.file_name),
    };
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, artifact.mime)
        .header(header::CONTENT_LENGTH, artifact.bytes.len())
        .header(header::CONTENT_DISPOSITION, disposition)
        .header("x-request-id", request_id)
        .body(Body::from(artifact.bytes))
        .unwrap_or_else(|e| {
            error!(error = %e, "could not build image response");
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        })
}

fn json(names: &[String]) -> Response<Body> {
    let mut response = Response::new(Body::from(serde_json::json!(names).to_string()));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    response
}

fn html(page: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(page));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}
