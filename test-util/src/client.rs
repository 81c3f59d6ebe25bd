//! JSON-lines client for wire-level tests.

use std::net::SocketAddr;

use forumd::{Actor, protocol::{Response, codec}};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};

use crate::AnyError;

/// A connection that numbers its requests.
#[derive(Debug)]
pub struct TestClient {
    framed: Framed<TcpStream, LinesCodec>,
    next_id: u64,
}

impl TestClient {
    /// Connect to `addr`.
    ///
    /// # Errors
    /// Returns an error if the connection fails.
    pub async fn connect(addr: SocketAddr) -> Result<Self, AnyError> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            framed: Framed::new(stream, codec()),
            next_id: 1,
        })
    }

    /// Connect and identify as `actor`.
    ///
    /// # Errors
    /// Returns an error if the connection fails or `identify` is refused.
    pub async fn connect_as(addr: SocketAddr, actor: &Actor) -> Result<Self, AnyError> {
        let mut client = Self::connect(addr).await?;
        let resp = client
            .request(
                "identify",
                json!({
                    "user_id": actor.user_id,
                    "role": actor.role,
                    "organization_id": actor.organization_id,
                }),
            )
            .await?;
        if !resp.ok {
            return Err(format!("identify refused: {resp:?}").into());
        }
        Ok(client)
    }

    /// Send `op` with the members of `fields` and wait for the response.
    ///
    /// # Errors
    /// Returns an error on I/O failure, an undecodable reply or a reply
    /// whose id does not match the request.
    pub async fn request(&mut self, op: &str, fields: Value) -> Result<Response, AnyError> {
        let id = self.next_id;
        self.next_id += 1;
        let mut frame = json!({ "id": id, "op": op });
        if let (Some(frame), Value::Object(fields)) = (frame.as_object_mut(), fields) {
            frame.extend(fields);
        }
        let resp = self.send_raw(&frame.to_string()).await?;
        if resp.id != id {
            return Err(format!("expected response {id}, got {}", resp.id).into());
        }
        Ok(resp)
    }

    /// Like [`TestClient::request`] but fail unless the response is `ok`,
    /// returning its payload.
    ///
    /// # Errors
    /// Returns an error when the request fails at any level.
    pub async fn call(&mut self, op: &str, fields: Value) -> Result<Value, AnyError> {
        let resp = self.request(op, fields).await?;
        if !resp.ok {
            return Err(format!("{op} failed: {resp:?}").into());
        }
        Ok(resp.data.unwrap_or(Value::Null))
    }

    /// Send one raw line and read one response.
    ///
    /// # Errors
    /// Returns an error on I/O failure, a closed connection or an
    /// undecodable reply.
    pub async fn send_raw(&mut self, line: &str) -> Result<Response, AnyError> {
        self.framed.send(line).await?;
        let reply = self
            .framed
            .next()
            .await
            .ok_or("connection closed before a response arrived")??;
        Ok(serde_json::from_str(&reply)?)
    }
}
