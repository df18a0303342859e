// Per-connection request loop and the accept loop that spawns it.
//
// Each connection is framed with RespFrameCodec and handled strictly in order:
// read a frame, run it through the engine, append accepted writes to the AOF,
// then send the response.

use crate::{Aof, CodecError, Engine, RespFrame, RespFrameCodec, SimpleError};
use anyhow::Result;
use futures::SinkExt;
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_stream::StreamExt;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// Accepts connections, one task per client, until `shutdown` resolves.
///
/// On shutdown no new client is accepted. Open connections finish the request
/// they are working on and close, and `serve` returns once all of them have,
/// so every acknowledged write is in the AOF by then.
pub async fn serve<F>(listener: TcpListener, engine: Engine, aof: Arc<Aof>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send,
{
    let (stop_tx, stop_rx) = watch::channel(false);
    let mut connections = JoinSet::new();
    tokio::pin!(shutdown);

    let ret = loop {
        tokio::select! {
            _ = &mut shutdown => break Ok(()),
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            accepted = listener.accept() => {
                let (stream, raddr) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => break Err(e.into()),
                };
                info!("Accepted connection from: {}", raddr);

                let engine = engine.clone();
                let aof = Arc::clone(&aof);
                let stop = stop_rx.clone();
                connections.spawn(async move {
                    match stream_handler(stream, engine, aof, stop).await {
                        Ok(_) => {
                            info!("Connection from {} exited", raddr);
                        }
                        Err(e) => {
                            warn!("handle error for {}: {:?}", raddr, e);
                        }
                    }
                });
            }
        }
    };

    info!("Closing {} open connections", connections.len());
    let _ = stop_tx.send(true);
    while connections.join_next().await.is_some() {}
    ret
}

/// Serves one client until it disconnects, sends something that cannot be
/// framed, or `stop` changes.
pub async fn stream_handler<S>(
    stream: S,
    engine: Engine,
    aof: Arc<Aof>,
    mut stop: watch::Receiver<bool>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(stream, RespFrameCodec);
    loop {
        let next = tokio::select! {
            next = framed.next() => next,
            _ = stop.changed() => return Ok(()),
        };
        match next {
            Some(Ok(frame)) => {
                debug!("Received frame: {:?}", frame);
                let response = aof.execute(&engine, frame).await;
                debug!("Sending response: {:?}", response);
                framed.send(response).await?;
            }
            Some(Err(CodecError::Resp(e))) => {
                // the rest of the stream cannot be trusted, tell the client and hang up
                let reply = SimpleError::new(format!("ERR protocol error: {}", e));
                let _ = framed.send(RespFrame::from(reply)).await;
                return Err(e.into());
            }
            Some(Err(e)) => return Err(e.into()),
            None => return Ok(()),
        }
    }
}
