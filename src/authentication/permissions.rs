use warp::http::Method;

use crate::{
    error::{Error, HtmlError},
    jwt::SessionData,
    schema::Uuid,
    SAFE_METHODS,
};

/// Everything a permission check may look at. Built per request by the
/// handlers and passed explicitly.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    pub method: &'a Method,
    pub session: Option<&'a SessionData>,
}

impl<'a> RequestContext<'a> {
    pub fn new(method: &'a Method, session: Option<&'a SessionData>) -> Self {
        Self { method, session }
    }

    pub fn is_safe(&self) -> bool {
        SAFE_METHODS.contains(&self.method.as_str())
    }

    pub fn require_session(&self) -> Result<&'a SessionData, Error> {
        self.session
            .ok_or_else(|| HtmlError::Unauthorized.default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileTarget {
    Me,
    Collection,
    Object,
}

/// Gate for the profile routes, evaluated top to bottom.
pub fn authorize_profile(ctx: &RequestContext, target: ProfileTarget) -> Result<(), Error> {
    if [Method::PUT, Method::PATCH, Method::DELETE].contains(ctx.method) {
        return Err(HtmlError::MethodNotAllowed.default());
    }
    if target == ProfileTarget::Object && *ctx.method == Method::POST {
        return Err(HtmlError::MethodNotAllowed.default());
    }

    match target {
        ProfileTarget::Me => {
            ctx.require_session()?;
            if !ctx.is_safe() {
                return Err(HtmlError::MethodNotAllowed.default());
            }
            Ok(())
        }
        ProfileTarget::Object => Ok(()),
        ProfileTarget::Collection => {
            if !ctx.is_safe() {
                ctx.require_session()?;
            }
            Ok(())
        }
    }
}

pub fn authorize_recipe(ctx: &RequestContext) -> Result<(), Error> {
    if ctx.is_safe() {
        return Ok(());
    }
    ctx.require_session().map(|_| ())
}

/// Object-level gate of the recipe routes: reads are open, mutation is
/// reserved to the author.
pub fn authorize_recipe_object(ctx: &RequestContext, author_id: Uuid) -> Result<(), Error> {
    if ctx.is_safe() {
        return Ok(());
    }

    let session = ctx.require_session()?;
    if session.user_id != author_id {
        return Err(HtmlError::Forbidden.default());
    }
    Ok(())
}
