//! Bare HTML pages. Styling and richer views are left to whatever sits in
//! front of the service.

use axum::response::Html;

const SIGNIN_PAGE: &str = r#"<!doctype html>
<html><head><meta charset="utf-8"><title>Sign in</title></head>
<body>
<h1>Sign in</h1>
<form method="post" action="/signin">
  <input name="username" placeholder="Username" autocomplete="username" required>
  <input name="password" type="password" placeholder="Password" autocomplete="current-password" required>
  <button type="submit">Sign in</button>
</form>
<p><a href="/newuser">Create an account</a></p>
</body></html>
"#;

const NEW_USER_PAGE: &str = r#"<!doctype html>
<html><head><meta charset="utf-8"><title>New account</title></head>
<body>
<h1>Create an account</h1>
<form method="post" action="/newuser">
  <input name="username" placeholder="Username" autocomplete="username" required>
  <input name="password" type="password" placeholder="Password" autocomplete="new-password" required>
  <button type="submit">Sign up</button>
</form>
<p><a href="/signin">Already registered?</a></p>
</body></html>
"#;

const CHAT_PAGE: &str = r#"<!doctype html>
<html><head><meta charset="utf-8"><title>Chat</title></head>
<body>
<form method="post" action="/signout"><button type="submit">Sign out</button></form>
<ul id="messages"></ul>
<p id="typing"></p>
<form id="send"><input id="body" autocomplete="off"><button type="submit">Send</button></form>
<script>
(async () => {
  const list = document.getElementById('messages');
  const typing = document.getElementById('typing');
  const input = document.getElementById('body');
  const show = (m) => {
    const li = document.createElement('li');
    li.textContent = `${m.display_name}: ${m.body}`;
    list.appendChild(li);
  };

  const me = await (await fetch('/api/display-name')).json();
  for (const m of await (await fetch('/api/messages')).json()) show(m);

  const proto = location.protocol === 'https:' ? 'wss' : 'ws';
  const ws = new WebSocket(`${proto}://${location.host}/socket`);
  ws.onmessage = (e) => {
    const frame = JSON.parse(e.data);
    if (frame.event === 'incoming message') { typing.textContent = ''; show(frame.data); }
    if (frame.event === 'typing' && frame.data !== me.display_name) {
      typing.textContent = `${frame.data} is typing...`;
    }
  };

  input.addEventListener('input', () =>
    ws.send(JSON.stringify({ event: 'typing', data: me.display_name })));
  document.getElementById('send').addEventListener('submit', (e) => {
    e.preventDefault();
    if (!input.value) return;
    ws.send(JSON.stringify({
      event: 'incoming message',
      data: { display_name: me.display_name, body: input.value },
    }));
    input.value = '';
  });
})();
</script>
</body></html>
"#;

/// GET /
pub async fn index() -> Html<&'static str> {
    Html(CHAT_PAGE)
}

/// GET /signin
pub async fn signin() -> Html<&'static str> {
    Html(SIGNIN_PAGE)
}

/// GET /newuser
pub async fn new_user() -> Html<&'static str> {
    Html(NEW_USER_PAGE)
}
